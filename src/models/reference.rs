//! Reference data read by the engine: exchange rates and novelties.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A conversion rate valid from a date onwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Source currency.
    pub from_currency: String,
    /// Target currency.
    pub to_currency: String,
    /// Units of `to_currency` per unit of `from_currency`.
    pub rate: Decimal,
    /// First date the rate applies.
    pub effective_date: NaiveDate,
}

/// An ad hoc period input for an employee (novedad).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Novelty {
    /// The employee.
    pub employee_id: String,
    /// The concept the quantity applies to.
    pub concept_code: String,
    /// Hours, days or amount, depending on the concept.
    pub quantity: Decimal,
    /// The date the novelty occurred.
    pub date: NaiveDate,
    /// Vacation days taken, consumed from the vacation ledger.
    #[serde(default)]
    pub is_vacation: bool,
}
