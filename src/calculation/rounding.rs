//! Monetary rounding helpers.
//!
//! Every amount the engine emits is quantized to two decimal places using
//! round-half-up (`MidpointAwayFromZero`).

use rust_decimal::{Decimal, RoundingStrategy};

/// The number of decimal places for monetary amounts.
pub const MONEY_SCALE: u32 = 2;

/// Tolerance below which a balance is treated as fully paid.
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Quantizes a value to two decimal places, rounding half away from zero.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::round_money;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// assert_eq!(round_money(Decimal::from_str("6152.8824").unwrap()), Decimal::from_str("6152.88").unwrap());
/// assert_eq!(round_money(Decimal::from_str("0.125").unwrap()), Decimal::from_str("0.13").unwrap());
/// ```
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to an arbitrary number of places, half away from zero.
pub fn round_to(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Divides `numerator` by `denominator`, yielding zero for a zero denominator.
pub fn safe_divide(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// Applies a percentage expressed in hundredths (7 means 7%) and rounds the result.
pub fn percentage_of(base: Decimal, percentage: Decimal) -> Decimal {
    round_money(base * percentage / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("2.344")), dec("2.34"));
        assert_eq!(round_money(dec("-2.345")), dec("-2.35"));
    }

    #[test]
    fn test_safe_divide_by_zero_is_zero() {
        assert_eq!(safe_divide(dec("100"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(safe_divide(dec("100"), dec("4")), dec("25"));
    }

    #[test]
    fn test_percentage_of_salary() {
        assert_eq!(percentage_of(dec("87898.32"), dec("7")), dec("6152.88"));
        assert_eq!(percentage_of(dec("26000.00"), dec("7")), dec("1820.00"));
    }

    #[test]
    fn test_balance_tolerance_is_one_cent() {
        assert_eq!(BALANCE_TOLERANCE, dec("0.01"));
    }
}
