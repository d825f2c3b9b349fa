//! Interest and amortization calculations for loans.
//!
//! Rates are annual percentages (12 means 12% per year). All amounts are
//! quantized with [`round_money`]. Non-positive principal, rate, days or
//! installment counts are no-op inputs and yield zero (or an empty schedule).
//! Powers are computed by repeated multiplication to stay in exact decimal
//! arithmetic.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{round_money, round_to};
use crate::models::{AmortizationMethod, InterestType};

/// Scale kept on intermediate growth factors.
const FACTOR_SCALE: u32 = 18;

/// One row of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based installment number.
    pub number: u32,
    /// Start date plus `number` months.
    pub estimated_date: NaiveDate,
    /// Interest plus principal.
    pub total_payment: Decimal,
    /// Interest portion.
    pub interest_portion: Decimal,
    /// Principal portion.
    pub principal_portion: Decimal,
    /// Balance after this installment.
    pub remaining_balance: Decimal,
}

/// Simple interest over a number of days.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::simple_interest;
/// use rust_decimal::Decimal;
///
/// // 10,000 at 12% for 30 days on a 360-day year
/// let interest = simple_interest(Decimal::from(10000), Decimal::from(12), 30, 360);
/// assert_eq!(interest, Decimal::from(100));
/// ```
pub fn simple_interest(
    principal: Decimal,
    annual_rate_pct: Decimal,
    days: i64,
    days_per_year: u32,
) -> Decimal {
    if principal <= Decimal::ZERO || annual_rate_pct <= Decimal::ZERO || days <= 0 || days_per_year == 0 {
        return Decimal::ZERO;
    }
    round_money(
        principal * annual_rate_pct / Decimal::ONE_HUNDRED * Decimal::from(days)
            / Decimal::from(days_per_year),
    )
}

/// Interest compounded daily over a number of days.
pub fn compound_interest(
    principal: Decimal,
    annual_rate_pct: Decimal,
    days: i64,
    days_per_year: u32,
) -> Decimal {
    if principal <= Decimal::ZERO || annual_rate_pct <= Decimal::ZERO || days <= 0 || days_per_year == 0 {
        return Decimal::ZERO;
    }
    let daily_rate = annual_rate_pct / Decimal::ONE_HUNDRED / Decimal::from(days_per_year);
    let factor = growth_factor(daily_rate, u32::try_from(days).unwrap_or(u32::MAX));
    round_money(principal * factor - principal)
}

/// Interest accrued according to `interest_type`.
pub fn accrue_interest(
    interest_type: InterestType,
    principal: Decimal,
    annual_rate_pct: Decimal,
    days: i64,
    days_per_year: u32,
) -> Decimal {
    match interest_type {
        InterestType::None => Decimal::ZERO,
        InterestType::Simple => simple_interest(principal, annual_rate_pct, days, days_per_year),
        InterestType::Compound => compound_interest(principal, annual_rate_pct, days, days_per_year),
    }
}

/// `(1 + rate)^periods` by repeated multiplication.
fn growth_factor(rate: Decimal, periods: u32) -> Decimal {
    let base = Decimal::ONE + rate;
    let mut factor = Decimal::ONE;
    for _ in 0..periods {
        factor = match factor.checked_mul(base) {
            Some(next) => round_to(next, FACTOR_SCALE),
            None => return factor,
        };
    }
    factor
}

/// Constant installment of a French (annuity) amortization.
///
/// Solves `P * i / (1 - (1 + i)^-n)` with `i` the periodic rate. A zero rate
/// spreads the principal evenly.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::french_installment;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let payment = french_installment(Decimal::from(10000), Decimal::from(12), 12, 12);
/// assert_eq!(payment, Decimal::from_str("888.49").unwrap());
/// ```
pub fn french_installment(
    principal: Decimal,
    annual_rate_pct: Decimal,
    num_installments: u32,
    months_per_year: u32,
) -> Decimal {
    if principal <= Decimal::ZERO || num_installments == 0 || months_per_year == 0 {
        return Decimal::ZERO;
    }
    let rate = periodic_rate(annual_rate_pct, months_per_year);
    if rate.is_zero() {
        return round_money(principal / Decimal::from(num_installments));
    }
    let factor = growth_factor(rate, num_installments);
    let denominator = factor - Decimal::ONE;
    if denominator.is_zero() {
        return round_money(principal / Decimal::from(num_installments));
    }
    round_money(principal * rate * factor / denominator)
}

fn periodic_rate(annual_rate_pct: Decimal, months_per_year: u32) -> Decimal {
    if annual_rate_pct <= Decimal::ZERO || months_per_year == 0 {
        return Decimal::ZERO;
    }
    annual_rate_pct / Decimal::ONE_HUNDRED / Decimal::from(months_per_year)
}

/// Builds a full amortization schedule.
///
/// The final installment's principal portion always equals the remaining
/// balance, so the schedule ends at exactly zero.
pub fn amortization_schedule(
    principal: Decimal,
    annual_rate_pct: Decimal,
    num_installments: u32,
    start_date: NaiveDate,
    method: AmortizationMethod,
    interest_type: InterestType,
    months_per_year: u32,
) -> Vec<Installment> {
    if principal <= Decimal::ZERO || num_installments == 0 {
        return Vec::new();
    }
    let rate_pct = match interest_type {
        InterestType::None => Decimal::ZERO,
        InterestType::Simple | InterestType::Compound => annual_rate_pct,
    };
    let rate = periodic_rate(rate_pct, months_per_year);
    let french_payment = french_installment(principal, rate_pct, num_installments, months_per_year);
    let german_principal = round_money(principal / Decimal::from(num_installments));

    let mut balance = round_money(principal);
    let mut schedule = Vec::with_capacity(num_installments as usize);
    for number in 1..=num_installments {
        let interest = round_money(balance * rate);
        let principal_portion = if number == num_installments {
            balance
        } else {
            let portion = match method {
                AmortizationMethod::French => french_payment - interest,
                AmortizationMethod::German => german_principal,
            };
            portion.max(Decimal::ZERO).min(balance)
        };
        balance -= principal_portion;
        schedule.push(Installment {
            number,
            estimated_date: start_date
                .checked_add_months(Months::new(number))
                .unwrap_or(start_date),
            total_payment: principal_portion + interest,
            interest_portion: interest,
            principal_portion,
            remaining_balance: balance,
        });
    }
    schedule
}

/// Installment for the next period of a loan whose schedule is recomputed
/// from its current balance.
pub fn next_installment(
    balance: Decimal,
    annual_rate_pct: Decimal,
    remaining_installments: u32,
    method: AmortizationMethod,
    interest_type: InterestType,
    months_per_year: u32,
) -> Decimal {
    if balance <= Decimal::ZERO || remaining_installments == 0 {
        return Decimal::ZERO;
    }
    if remaining_installments == 1 {
        return round_money(balance);
    }
    let rate_pct = match interest_type {
        InterestType::None => Decimal::ZERO,
        InterestType::Simple | InterestType::Compound => annual_rate_pct,
    };
    match method {
        AmortizationMethod::French => {
            french_installment(balance, rate_pct, remaining_installments, months_per_year)
        }
        AmortizationMethod::German => {
            round_money(balance / Decimal::from(remaining_installments))
                + round_money(balance * periodic_rate(rate_pct, months_per_year))
        }
    }
}
