//! Formula and rule evaluation.
//!
//! Calculation rules are declarative [`FormulaSchema`]s: typed steps
//! (calculation, conditional, tax-table lookup, assignment) evaluated in
//! order against a per-employee variable context. The result is always a
//! single amount quantized to two decimals.
//!
//! Any malformed schema or missing input surfaces as
//! [`EngineError::FormulaEvaluation`](crate::error::EngineError::FormulaEvaluation).

mod evaluator;
mod expression;
mod schema;
mod tax_table;

pub use evaluator::{EvaluationResult, FormulaEngine, execute};
pub use expression::{BinaryOp, Expr, UnaryOp};
pub use schema::{FormulaSchema, InputDef, Step};
pub use tax_table::{TaxBracket, TaxTable};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// A value in the formula variable context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A decimal number.
    Number(Decimal),
    /// A calendar date.
    Date(NaiveDate),
}

impl Value {
    /// Boolean results are encoded as one and zero.
    pub fn from_bool(value: bool) -> Self {
        Self::Number(if value { Decimal::ONE } else { Decimal::ZERO })
    }

    /// Returns the number, or an error for dates.
    pub fn as_number(&self) -> EngineResult<Decimal> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Date(d) => Err(EngineError::formula(format!(
                "expected a number, found date {}",
                d
            ))),
        }
    }

    /// Returns the date, or an error for numbers.
    pub fn as_date(&self) -> EngineResult<NaiveDate> {
        match self {
            Self::Date(d) => Ok(*d),
            Self::Number(n) => Err(EngineError::formula(format!(
                "expected a date, found number {}",
                n
            ))),
        }
    }

    /// Non-zero numbers and all dates are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Number(n) => !n.is_zero(),
            Self::Date(_) => true,
        }
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}
