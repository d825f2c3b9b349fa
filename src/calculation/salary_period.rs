//! Proration of a monthly salary to a pay period.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::round_money;
use crate::config::CalculationConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{PayPeriod, Periodicity};

/// The outcome of a period salary calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSalary {
    /// Salary for the period.
    pub amount: Decimal,
    /// Days in the period, inclusive.
    pub period_days: i64,
    /// Days of the period inside the employment window.
    pub worked_days: i64,
}

/// The dates bounding an employee's employment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmploymentWindow {
    /// First day employed.
    pub hire_date: Option<NaiveDate>,
    /// Last day employed.
    pub termination_date: Option<NaiveDate>,
}

/// Computes the salary owed for a pay period.
///
/// A monthly payroll over a full calendar month pays the monthly salary
/// unchanged. A biweekly payroll pays half the monthly salary. Anything
/// else pays the rounded daily rate (`monthly / days_per_month`) times the
/// period days. When hire or termination truncates the period, the amount
/// is prorated by `worked_days / period_days`.
///
/// # Errors
///
/// Returns a validation error when the period ends before it starts or spans
/// more than `config.max_period_days` days.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::{EmploymentWindow, period_salary};
/// use payroll_engine::config::CalculationConfig;
/// use payroll_engine::models::Periodicity;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let result = period_salary(
///     Decimal::from(30000),
///     Periodicity::Biweekly,
///     NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
///     EmploymentWindow::default(),
///     &CalculationConfig::default(),
/// )
/// .unwrap();
/// assert_eq!(result.amount, Decimal::from(15000));
/// ```
pub fn period_salary(
    monthly_salary: Decimal,
    periodicity: Periodicity,
    period_start: NaiveDate,
    period_end: NaiveDate,
    employment: EmploymentWindow,
    config: &CalculationConfig,
) -> EngineResult<PeriodSalary> {
    let period = PayPeriod {
        start_date: period_start,
        end_date: period_end,
    };
    period.validate()?;
    if period.days() > config.max_period_days {
        return Err(EngineError::validation(format!(
            "period {} to {} spans {} days (maximum {})",
            period_start,
            period_end,
            period.days(),
            config.max_period_days
        )));
    }

    let period_days = period.days();
    let worked_start = employment
        .hire_date
        .map_or(period_start, |hire| hire.max(period_start));
    let worked_end = employment
        .termination_date
        .map_or(period_end, |term| term.min(period_end));
    let worked_days = if worked_end < worked_start {
        0
    } else {
        (worked_end - worked_start).num_days() + 1
    };

    if worked_days == 0 || monthly_salary <= Decimal::ZERO {
        return Ok(PeriodSalary {
            amount: Decimal::ZERO,
            period_days,
            worked_days,
        });
    }

    let full_period_amount = match periodicity {
        Periodicity::Monthly if period.is_full_calendar_month() => monthly_salary,
        Periodicity::Biweekly => round_money(monthly_salary / Decimal::TWO),
        _ => round_money(config.daily_rate(monthly_salary) * Decimal::from(period_days)),
    };

    let amount = if worked_days < period_days {
        round_money(full_period_amount * Decimal::from(worked_days) / Decimal::from(period_days))
    } else {
        full_period_amount
    };

    Ok(PeriodSalary {
        amount,
        period_days,
        worked_days,
    })
}
