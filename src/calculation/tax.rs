//! Progressive income tax by the accumulated-average method.

use rust_decimal::Decimal;

use super::round_money;
use crate::formula::TaxTable;

/// Withholding due this period under the accumulated-average method.
///
/// The year-to-date taxable income (including this period) is averaged per
/// period, projected to a full year, and run through the bracket table. The
/// share of annual tax due so far, minus what was already withheld, is this
/// period's withholding. Over-withholding never produces a negative amount.
///
/// `periods_before` counts every period the accumulated figures cover,
/// including those carried in by opening balances.
///
/// ```text
/// n           = periods_before + 1
/// average     = (accumulated_before + current) / n
/// annual_tax  = table(average * periods_per_year)
/// due         = annual_tax / periods_per_year * n - withheld_before
/// ```
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::accumulated_average_withholding;
/// use payroll_engine::formula::{TaxBracket, TaxTable};
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let dec = |s: &str| Decimal::from_str(s).unwrap();
/// let table = TaxTable::new(vec![
///     TaxBracket { lower_bound: dec("0"), upper_bound: Some(dec("100000")), rate: dec("0"), fixed_amount: dec("0"), base_offset: dec("0") },
///     TaxBracket { lower_bound: dec("100000"), upper_bound: None, rate: dec("0.15"), fixed_amount: dec("0"), base_offset: dec("100000") },
/// ]).unwrap();
///
/// // 20,000 a month projects to 240,000 a year: (240,000 - 100,000) * 15% / 12
/// let due = accumulated_average_withholding(&table, dec("0"), dec("20000"), 0, dec("0"), 12);
/// assert_eq!(due, dec("1750.00"));
/// ```
pub fn accumulated_average_withholding(
    table: &TaxTable,
    accumulated_taxable_before: Decimal,
    current_taxable: Decimal,
    periods_before: u32,
    withheld_before: Decimal,
    periods_per_year: u32,
) -> Decimal {
    if periods_per_year == 0 {
        return Decimal::ZERO;
    }
    let n = Decimal::from(periods_before) + Decimal::ONE;
    let ppy = Decimal::from(periods_per_year);

    let average = (accumulated_taxable_before + current_taxable) / n;
    let annual_income = average * ppy;
    let annual_tax = table.tax_for(annual_income);
    let due_to_date = annual_tax / ppy * n;

    round_money(due_to_date - withheld_before).max(Decimal::ZERO)
}
