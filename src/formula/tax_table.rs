//! Progressive tax tables.
//!
//! A table is an ordered list of brackets. Brackets must be contiguous
//! (each upper bound equals the next lower bound), ascending by lower bound,
//! and the last bracket must be open-ended.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// A single bracket of a progressive tax table.
///
/// The tax for a value inside the bracket is
/// `fixed_amount + (value - base_offset) * rate`, where `rate` is a
/// fraction (0.15 for 15%).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    /// Inclusive lower bound of the bracket.
    pub lower_bound: Decimal,
    /// Exclusive upper bound, or `None` for the open-ended top bracket.
    #[serde(default)]
    pub upper_bound: Option<Decimal>,
    /// Marginal rate applied above `base_offset`, as a fraction.
    pub rate: Decimal,
    /// Fixed tax accumulated by the lower brackets.
    #[serde(default)]
    pub fixed_amount: Decimal,
    /// The amount subtracted from the value before applying `rate`.
    #[serde(default)]
    pub base_offset: Decimal,
}

impl TaxBracket {
    fn contains(&self, value: Decimal) -> bool {
        value >= self.lower_bound && self.upper_bound.is_none_or(|upper| value < upper)
    }
}

/// An ordered progressive tax table.
///
/// # Example
///
/// ```
/// use payroll_engine::formula::{TaxBracket, TaxTable};
/// use rust_decimal::Decimal;
///
/// let table = TaxTable::new(vec![
///     TaxBracket {
///         lower_bound: Decimal::ZERO,
///         upper_bound: Some(Decimal::from(100)),
///         rate: Decimal::ZERO,
///         fixed_amount: Decimal::ZERO,
///         base_offset: Decimal::ZERO,
///     },
///     TaxBracket {
///         lower_bound: Decimal::from(100),
///         upper_bound: None,
///         rate: Decimal::new(10, 2),
///         fixed_amount: Decimal::ZERO,
///         base_offset: Decimal::from(100),
///     },
/// ])
/// .unwrap();
///
/// assert_eq!(table.tax_for(Decimal::from(300)), Decimal::from(20));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxTable {
    brackets: Vec<TaxBracket>,
}

impl TaxTable {
    /// Builds a table, rejecting brackets that are out of order, overlapping,
    /// gapped, or not open-ended at the top.
    pub fn new(brackets: Vec<TaxBracket>) -> EngineResult<Self> {
        let table = Self { brackets };
        table.validate()?;
        Ok(table)
    }

    /// Returns the table's brackets in ascending order.
    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    /// Checks the ordering and contiguity invariants.
    ///
    /// Tables deserialized from configuration bypass [`TaxTable::new`], so the
    /// evaluator calls this before every lookup.
    pub fn validate(&self) -> EngineResult<()> {
        let Some(last) = self.brackets.last() else {
            return Err(EngineError::formula("tax table has no brackets"));
        };
        if last.upper_bound.is_some() {
            return Err(EngineError::formula(
                "last tax bracket must be open-ended",
            ));
        }

        for pair in self.brackets.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            let Some(upper) = current.upper_bound else {
                return Err(EngineError::formula(format!(
                    "only the last tax bracket may be open-ended (bracket starting at {})",
                    current.lower_bound
                )));
            };
            if upper <= current.lower_bound {
                return Err(EngineError::formula(format!(
                    "tax bracket upper bound {} must exceed lower bound {}",
                    upper, current.lower_bound
                )));
            }
            if next.lower_bound != upper {
                return Err(EngineError::formula(format!(
                    "tax brackets are not contiguous: {} is followed by {}",
                    upper, next.lower_bound
                )));
            }
        }
        Ok(())
    }

    /// Finds the bracket containing `value`.
    pub fn bracket_for(&self, value: Decimal) -> Option<&TaxBracket> {
        self.brackets.iter().find(|b| b.contains(value))
    }

    /// Computes the (unrounded) tax for `value`.
    ///
    /// Values below the first bracket owe nothing.
    pub fn tax_for(&self, value: Decimal) -> Decimal {
        match self.bracket_for(value) {
            Some(bracket) => bracket.fixed_amount + (value - bracket.base_offset) * bracket.rate,
            None => Decimal::ZERO,
        }
    }
}
