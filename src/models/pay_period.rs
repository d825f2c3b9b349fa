//! Pay period model.
//!
//! This module contains the [`PayPeriod`] type used to define the
//! calculation window of a payroll run.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// The longest period, in days, the engine accepts.
pub const MAX_PERIOD_DAYS: i64 = 366;

/// Represents a pay period with its inclusive date range.
///
/// # Example
///
/// ```
/// use payroll_engine::models::PayPeriod;
/// use chrono::NaiveDate;
///
/// let period = PayPeriod::new(
///     NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
/// )
/// .unwrap();
///
/// assert_eq!(period.days(), 28);
/// assert!(period.is_full_calendar_month());
/// assert!(period.contains_date(NaiveDate::from_ymd_opt(2025, 2, 14).unwrap()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayPeriod {
    /// The start date of the pay period (inclusive).
    pub start_date: NaiveDate,
    /// The end date of the pay period (inclusive).
    pub end_date: NaiveDate,
}

impl PayPeriod {
    /// Creates a validated pay period.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `end_date` precedes `start_date` or the
    /// period spans more than [`MAX_PERIOD_DAYS`] days.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> EngineResult<Self> {
        let period = Self {
            start_date,
            end_date,
        };
        period.validate()?;
        Ok(period)
    }

    /// Checks the period bounds.
    pub fn validate(&self) -> EngineResult<()> {
        if self.end_date < self.start_date {
            return Err(EngineError::validation(format!(
                "period end {} precedes period start {}",
                self.end_date, self.start_date
            )));
        }
        if self.days() > MAX_PERIOD_DAYS {
            return Err(EngineError::validation(format!(
                "period {} to {} spans {} days (maximum {})",
                self.start_date,
                self.end_date,
                self.days(),
                MAX_PERIOD_DAYS
            )));
        }
        Ok(())
    }

    /// Number of days in the period, inclusive of both endpoints.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Checks if a given date falls within this pay period (inclusive).
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Returns true when the two periods share at least one day.
    pub fn overlaps(&self, other: &PayPeriod) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }

    /// Returns true when the period runs from the first to the last day of one calendar month.
    pub fn is_full_calendar_month(&self) -> bool {
        self.start_date.day() == 1
            && self.start_date.year() == self.end_date.year()
            && self.start_date.month() == self.end_date.month()
            && self.end_date.succ_opt().is_some_and(|next| next.day() == 1)
    }
}
