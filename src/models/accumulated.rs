//! Year-to-date accumulators.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OpeningBalances, YearToDate};

/// One period's contribution to the accumulators.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeriodContribution {
    /// Gross salary for the period.
    pub gross_salary: Decimal,
    /// Taxable income for the period.
    pub taxable_salary: Decimal,
    /// Pre-tax deductions for the period.
    pub pre_tax_deductions: Decimal,
    /// Income tax withheld in the period.
    pub tax_withheld: Decimal,
}

/// Running totals per employee, payroll type and fiscal year.
///
/// Year fields only grow within a fiscal year. `month_gross` resets when a
/// period ends in a different calendar month than the previous update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatedAnnual {
    /// The employee.
    pub employee_id: String,
    /// The payroll type the totals belong to.
    pub payroll_type_id: String,
    /// The company.
    pub company_id: String,
    /// First day of the fiscal year.
    pub fiscal_year_start: NaiveDate,
    /// Accumulated gross salary, opening balance included.
    pub gross_salary: Decimal,
    /// Accumulated taxable salary, opening balance included.
    pub taxable_salary: Decimal,
    /// Accumulated pre-tax deductions, opening balance included.
    pub pre_tax_deductions: Decimal,
    /// Accumulated tax withheld, opening balance included.
    pub tax_withheld: Decimal,
    /// Periods processed by the engine; opening balances do not count.
    pub periods_processed: u32,
    /// Periods covered by the opening balances.
    #[serde(default)]
    pub opening_periods: u32,
    /// Gross salary accumulated in the current calendar month.
    pub month_gross: Decimal,
    /// End date of the last period applied.
    #[serde(default)]
    pub last_period_end: Option<NaiveDate>,
    /// The opening balances this row was seeded with.
    #[serde(default)]
    pub opening: Option<OpeningBalances>,
}

impl AccumulatedAnnual {
    /// Creates an empty accumulator.
    pub fn new(
        employee_id: impl Into<String>,
        payroll_type_id: impl Into<String>,
        company_id: impl Into<String>,
        fiscal_year_start: NaiveDate,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            payroll_type_id: payroll_type_id.into(),
            company_id: company_id.into(),
            fiscal_year_start,
            gross_salary: Decimal::ZERO,
            taxable_salary: Decimal::ZERO,
            pre_tax_deductions: Decimal::ZERO,
            tax_withheld: Decimal::ZERO,
            periods_processed: 0,
            opening_periods: 0,
            month_gross: Decimal::ZERO,
            last_period_end: None,
            opening: None,
        }
    }

    /// Seeds the accumulator with pre-system balances covering `periods`
    /// pay periods.
    pub fn seed(&mut self, opening: &OpeningBalances, periods: u32) {
        self.opening_periods = periods;
        self.gross_salary += opening.gross_salary;
        self.taxable_salary += opening.taxable_salary;
        self.pre_tax_deductions += opening.pre_tax_deductions;
        self.tax_withheld += opening.tax_withheld;
        self.opening = Some(opening.clone());
    }

    /// Adds one period's contribution.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::models::{AccumulatedAnnual, PeriodContribution};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// let mut acc = AccumulatedAnnual::new("emp_001", "monthly", "acme", start);
    /// let contribution = PeriodContribution {
    ///     gross_salary: Decimal::from(10000),
    ///     ..Default::default()
    /// };
    /// acc.apply_period(&contribution, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());
    /// acc.apply_period(&contribution, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    ///
    /// assert_eq!(acc.gross_salary, Decimal::from(20000));
    /// assert_eq!(acc.month_gross, Decimal::from(10000));
    /// assert_eq!(acc.periods_processed, 2);
    /// ```
    pub fn apply_period(&mut self, contribution: &PeriodContribution, period_end: NaiveDate) {
        let new_month = self
            .last_period_end
            .is_none_or(|last| last.year() != period_end.year() || last.month() != period_end.month());
        if new_month {
            self.month_gross = Decimal::ZERO;
        }

        self.gross_salary += contribution.gross_salary;
        self.month_gross += contribution.gross_salary;
        self.taxable_salary += contribution.taxable_salary;
        self.pre_tax_deductions += contribution.pre_tax_deductions;
        self.tax_withheld += contribution.tax_withheld;
        self.periods_processed += 1;
        self.last_period_end = Some(period_end);
    }

    /// The figures exposed to formulas for the next period.
    ///
    /// `month_gross` is reported as zero when `period_end` opens a new month.
    pub fn year_to_date(&self, period_end: NaiveDate) -> YearToDate {
        let same_month = self
            .last_period_end
            .is_some_and(|last| last.year() == period_end.year() && last.month() == period_end.month());
        YearToDate {
            gross_salary: self.gross_salary,
            taxable_salary: self.taxable_salary,
            pre_tax_deductions: self.pre_tax_deductions,
            tax_withheld: self.tax_withheld,
            periods_processed: self.periods_processed,
            periods: self.opening_periods + self.periods_processed,
            month_gross: if same_month {
                self.month_gross
            } else {
                Decimal::ZERO
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_three_periods_equal_manual_sum() {
        let mut acc = AccumulatedAnnual::new("emp", "monthly", "acme", date(2025, 1, 1));
        let contributions = [
            PeriodContribution {
                gross_salary: dec("10000.00"),
                taxable_salary: dec("10000.00"),
                pre_tax_deductions: dec("700.00"),
                tax_withheld: dec("120.50"),
            },
            PeriodContribution {
                gross_salary: dec("11000.00"),
                taxable_salary: dec("10500.00"),
                pre_tax_deductions: dec("770.00"),
                tax_withheld: dec("150.25"),
            },
            PeriodContribution {
                gross_salary: dec("9000.00"),
                taxable_salary: dec("9000.00"),
                pre_tax_deductions: dec("630.00"),
                tax_withheld: dec("90.00"),
            },
        ];
        for (i, c) in contributions.iter().enumerate() {
            acc.apply_period(c, date(2025, i as u32 + 1, 28));
        }

        assert_eq!(acc.gross_salary, dec("30000.00"));
        assert_eq!(acc.taxable_salary, dec("29500.00"));
        assert_eq!(acc.pre_tax_deductions, dec("2100.00"));
        assert_eq!(acc.tax_withheld, dec("360.75"));
        assert_eq!(acc.periods_processed, 3);
    }

    #[test]
    fn test_month_accumulator_resets_on_new_month() {
        let mut acc = AccumulatedAnnual::new("emp", "biweekly", "acme", date(2025, 1, 1));
        let half = PeriodContribution {
            gross_salary: dec("5000.00"),
            ..Default::default()
        };
        acc.apply_period(&half, date(2025, 1, 15));
        acc.apply_period(&half, date(2025, 1, 31));
        assert_eq!(acc.month_gross, dec("10000.00"));
        assert_eq!(acc.year_to_date(date(2025, 1, 31)).month_gross, dec("10000.00"));
        assert_eq!(acc.year_to_date(date(2025, 2, 15)).month_gross, Decimal::ZERO);

        acc.apply_period(&half, date(2025, 2, 15));
        assert_eq!(acc.month_gross, dec("5000.00"));
        assert_eq!(acc.gross_salary, dec("15000.00"));
    }

    #[test]
    fn test_seed_does_not_count_as_processed_period() {
        let mut acc = AccumulatedAnnual::new("emp", "monthly", "acme", date(2025, 1, 1));
        acc.seed(
            &OpeningBalances {
                fiscal_year: 2025,
                gross_salary: dec("60000.00"),
                taxable_salary: dec("60000.00"),
                pre_tax_deductions: Decimal::ZERO,
                tax_withheld: dec("4200.00"),
                periods: Some(6),
            },
            6,
        );
        assert_eq!(acc.periods_processed, 0);
        assert_eq!(acc.year_to_date(date(2025, 7, 31)).periods, 6);

        acc.apply_period(&PeriodContribution::default(), date(2025, 7, 31));
        assert_eq!(acc.periods_processed, 1);
        assert_eq!(acc.year_to_date(date(2025, 8, 31)).periods, 7);
        assert_eq!(acc.gross_salary, dec("60000.00"));
        assert_eq!(acc.tax_withheld, dec("4200.00"));
    }
}
