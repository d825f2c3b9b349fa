//! Year-to-date accumulation.
//!
//! The accumulators are the only channel through which one period's tax
//! base reaches the progressive tax calculation of the next.

use chrono::{Datelike, NaiveDate};

use crate::models::{
    AccumulatedAnnual, Employee, EmployeeCalculation, PayrollType, PeriodContribution,
};

/// The first day of the fiscal year containing `calculation_date`.
///
/// Without a payroll type the fiscal year is the calendar year.
pub fn fiscal_year_start(payroll_type: Option<&PayrollType>, calculation_date: NaiveDate) -> NaiveDate {
    match payroll_type {
        Some(t) => t.fiscal_year_start(calculation_date),
        None => NaiveDate::from_ymd_opt(calculation_date.year(), 1, 1).unwrap_or(calculation_date),
    }
}

/// Seeds a newly created accumulator from the employee's opening balances.
///
/// Opening balances apply only to the fiscal year they were recorded for
/// and only once. The periods they cover are taken from the balances, or
/// derived from the whole months between the fiscal-year start and
/// `first_period_start` at `periods_per_year`. Returns true when seeding
/// happened.
pub fn seed_opening_balances(
    accumulated: &mut AccumulatedAnnual,
    employee: &Employee,
    first_period_start: NaiveDate,
    periods_per_year: u32,
) -> bool {
    let Some(opening) = &employee.opening_balances else {
        return false;
    };
    let is_fresh = accumulated.opening.is_none() && accumulated.periods_processed == 0;
    if !is_fresh || opening.fiscal_year != accumulated.fiscal_year_start.year() {
        return false;
    }
    let periods = opening.periods.unwrap_or_else(|| {
        elapsed_periods(accumulated.fiscal_year_start, first_period_start, periods_per_year)
    });
    accumulated.seed(opening, periods);
    true
}

fn elapsed_periods(fiscal_year_start: NaiveDate, until: NaiveDate, periods_per_year: u32) -> u32 {
    let months = (until.year() - fiscal_year_start.year()) * 12 + until.month() as i32
        - fiscal_year_start.month() as i32;
    let months = u32::try_from(months).unwrap_or(0);
    months * periods_per_year / 12
}

/// This period's contribution to the accumulators.
pub fn period_contribution(calc: &EmployeeCalculation) -> PeriodContribution {
    PeriodContribution {
        gross_salary: calc.gross_salary(),
        taxable_salary: calc.taxable_income(),
        pre_tax_deductions: calc.pre_tax_deductions(),
        tax_withheld: calc.tax_withheld(),
    }
}

/// Adds an employee's period results to the accumulator.
pub fn accumulate(accumulated: &mut AccumulatedAnnual, calc: &EmployeeCalculation) {
    let contribution = period_contribution(calc);
    accumulated.apply_period(&contribution, calc.period.end_date);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::test_support::{calculation, employee};
    use crate::models::{LineItem, LineKind, OpeningBalances, Periodicity, TaxTreatment};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fiscal_year_defaults_to_calendar() {
        assert_eq!(fiscal_year_start(None, date(2025, 8, 15)), date(2025, 1, 1));
        let t = PayrollType {
            id: "pt".to_string(),
            name: "Monthly".to_string(),
            periodicity: Periodicity::Monthly,
            fiscal_year_start_month: 7,
            fiscal_year_start_day: 1,
            periods_per_year: None,
        };
        assert_eq!(fiscal_year_start(Some(&t), date(2025, 3, 1)), date(2024, 7, 1));
    }

    fn deduction_line(code: &str, amount: Decimal, tax_treatment: TaxTreatment) -> LineItem {
        LineItem {
            code: code.to_string(),
            name: code.to_string(),
            kind: LineKind::Deduction,
            amount,
            priority: 1,
            concept_code: Some(code.to_string()),
            loan_id: None,
            tax_treatment,
            mandatory: true,
        }
    }

    #[test]
    fn test_contribution_classifies_deductions() {
        let mut calc = calculation(dec("25000.00"));
        calc.add_item(LineItem::perception("BONUS", "Bonus", dec("1000.00"), true));
        calc.add_item(LineItem::perception("MEAL", "Meal", dec("500.00"), false));
        calc.add_item(deduction_line("INSS", dec("1855.00"), TaxTreatment::PreTax));
        calc.add_item(deduction_line("IR", dec("2752.67"), TaxTreatment::Tax));
        calc.add_item(deduction_line("UNION", dec("100.00"), TaxTreatment::None));

        let c = period_contribution(&calc);
        assert_eq!(c.gross_salary, dec("26500.00"));
        assert_eq!(c.taxable_salary, dec("26000.00"));
        assert_eq!(c.pre_tax_deductions, dec("1855.00"));
        assert_eq!(c.tax_withheld, dec("2752.67"));
    }

    #[test]
    fn test_opening_balances_seed_matching_year_once() {
        let mut emp = employee();
        emp.opening_balances = Some(OpeningBalances {
            fiscal_year: 2025,
            gross_salary: dec("60000.00"),
            taxable_salary: dec("60000.00"),
            pre_tax_deductions: Decimal::ZERO,
            tax_withheld: dec("4200.00"),
            periods: Some(6),
        });

        let mut acc = AccumulatedAnnual::new("emp_001", "pt", "acme", date(2025, 1, 1));
        assert!(seed_opening_balances(&mut acc, &emp, date(2025, 7, 1), 12));
        assert!(!seed_opening_balances(&mut acc, &emp, date(2025, 7, 1), 12));
        assert_eq!(acc.gross_salary, dec("60000.00"));
        assert_eq!(acc.opening_periods, 6);

        let mut next_year = AccumulatedAnnual::new("emp_001", "pt", "acme", date(2026, 1, 1));
        assert!(!seed_opening_balances(&mut next_year, &emp, date(2026, 1, 1), 12));
        assert_eq!(next_year.gross_salary, Decimal::ZERO);
    }

    #[test]
    fn test_opening_periods_derived_from_fiscal_start() {
        let mut emp = employee();
        emp.opening_balances = Some(OpeningBalances {
            fiscal_year: 2025,
            taxable_salary: dec("50000.00"),
            ..Default::default()
        });

        let mut monthly = AccumulatedAnnual::new("emp_001", "pt", "acme", date(2025, 1, 1));
        assert!(seed_opening_balances(&mut monthly, &emp, date(2025, 6, 1), 12));
        assert_eq!(monthly.opening_periods, 5);

        let mut biweekly = AccumulatedAnnual::new("emp_001", "pt", "acme", date(2025, 1, 1));
        assert!(seed_opening_balances(&mut biweekly, &emp, date(2025, 6, 1), 24));
        assert_eq!(biweekly.opening_periods, 10);

        let mut april_year = AccumulatedAnnual::new("emp_001", "pt", "acme", date(2025, 4, 1));
        assert!(seed_opening_balances(&mut april_year, &emp, date(2026, 2, 1), 12));
        assert_eq!(april_year.opening_periods, 10);
    }

    #[test]
    fn test_accumulate_uses_period_end() {
        let calc = calculation(dec("10000.00"));
        let mut acc = AccumulatedAnnual::new("emp_001", "pt", "acme", date(2025, 1, 1));
        accumulate(&mut acc, &calc);
        assert_eq!(acc.last_period_end, Some(date(2025, 1, 31)));
        assert_eq!(acc.month_gross, dec("10000.00"));
        assert_eq!(acc.periods_processed, 1);
    }
}
