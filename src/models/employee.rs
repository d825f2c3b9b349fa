//! Employee model and related types.
//!
//! This module defines the [`Employee`] struct, the pre-system
//! [`OpeningBalances`] used to seed year-to-date accumulators, and
//! per-employee concept overrides.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Accumulated values carried over from before the engine was adopted.
///
/// When an employee's accumulator for a fiscal year is created for the
/// first time, these values seed it so that progressive tax calculation
/// sees the full year even when the system starts mid-year.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpeningBalances {
    /// The fiscal year (by start year) these balances belong to.
    pub fiscal_year: i32,
    /// Gross salary accumulated before adoption.
    #[serde(default)]
    pub gross_salary: Decimal,
    /// Taxable salary accumulated before adoption.
    #[serde(default)]
    pub taxable_salary: Decimal,
    /// Pre-tax deductions accumulated before adoption.
    #[serde(default)]
    pub pre_tax_deductions: Decimal,
    /// Income tax withheld before adoption.
    #[serde(default)]
    pub tax_withheld: Decimal,
    /// Pay periods the balances cover. When absent it is derived from the
    /// months between the fiscal-year start and the first period processed.
    #[serde(default)]
    pub periods: Option<u32>,
}

/// A per-employee override of a concept assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptOverride {
    /// The concept the override applies to.
    pub concept_code: String,
    /// An explicit amount that wins outright.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// A percentage applied to base salary instead of the concept's own.
    #[serde(default)]
    pub percentage: Option<Decimal>,
}

/// Represents an employee linked to a payroll definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    /// Unique identifier for the employee.
    pub id: String,
    /// Human-facing employee code.
    pub code: String,
    /// First name(s).
    pub first_name: String,
    /// Last name(s).
    pub last_name: String,
    /// The company the employee belongs to.
    pub company_id: String,
    /// Monthly base salary in `currency`.
    pub base_salary: Decimal,
    /// The currency the base salary is expressed in.
    pub currency: String,
    /// The date employment started.
    pub hire_date: NaiveDate,
    /// The date employment ended, if any.
    #[serde(default)]
    pub termination_date: Option<NaiveDate>,
    /// Whether the employee is active.
    #[serde(default = "default_true")]
    pub active: bool,
    /// The vacation policy the employee accrues under.
    #[serde(default)]
    pub vacation_policy: Option<String>,
    /// Pre-system accumulated balances.
    #[serde(default)]
    pub opening_balances: Option<OpeningBalances>,
    /// Per-employee overrides of concept assignments.
    #[serde(default)]
    pub overrides: Vec<ConceptOverride>,
}

fn default_true() -> bool {
    true
}

impl Employee {
    /// Returns the employee's display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Returns the override for a concept, if any.
    pub fn override_for(&self, concept_code: &str) -> Option<&ConceptOverride> {
        self.overrides.iter().find(|o| o.concept_code == concept_code)
    }

    /// Returns true when the employee was employed at some point between `start` and `end`.
    ///
    /// # Examples
    ///
    /// ```
    /// use payroll_engine::models::Employee;
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let employee = Employee {
    ///     id: "emp_001".to_string(),
    ///     code: "E001".to_string(),
    ///     first_name: "Ana".to_string(),
    ///     last_name: "Lopez".to_string(),
    ///     company_id: "acme".to_string(),
    ///     base_salary: Decimal::from(25000),
    ///     currency: "NIO".to_string(),
    ///     hire_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
    ///     termination_date: None,
    ///     active: true,
    ///     vacation_policy: None,
    ///     opening_balances: None,
    ///     overrides: vec![],
    /// };
    /// let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
    /// assert!(employee.is_employed_during(start, end));
    /// ```
    pub fn is_employed_during(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.hire_date <= end && self.termination_date.is_none_or(|t| t >= start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_employee() -> Employee {
        Employee {
            id: "emp_001".to_string(),
            code: "E001".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Lopez".to_string(),
            company_id: "acme".to_string(),
            base_salary: Decimal::new(2500000, 2),
            currency: "NIO".to_string(),
            hire_date: NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            termination_date: None,
            active: true,
            vacation_policy: None,
            opening_balances: None,
            overrides: vec![],
        }
    }

    #[test]
    fn test_deserialize_employee_with_defaults() {
        let json = r#"{
            "id": "emp_001",
            "code": "E001",
            "first_name": "Ana",
            "last_name": "Lopez",
            "company_id": "acme",
            "base_salary": "25000.00",
            "currency": "NIO",
            "hire_date": "2023-06-01"
        }"#;

        let employee: Employee = serde_json::from_str(json).unwrap();
        assert!(employee.active);
        assert_eq!(employee.base_salary, Decimal::new(2500000, 2));
        assert!(employee.termination_date.is_none());
        assert!(employee.overrides.is_empty());
    }

    #[test]
    fn test_deserialize_opening_balances() {
        let json = r#"{
            "fiscal_year": 2025,
            "gross_salary": "60000.00",
            "tax_withheld": "4200.00"
        }"#;
        let opening: OpeningBalances = serde_json::from_str(json).unwrap();
        assert_eq!(opening.gross_salary, Decimal::new(6000000, 2));
        assert_eq!(opening.taxable_salary, Decimal::ZERO);
        assert_eq!(opening.tax_withheld, Decimal::new(420000, 2));
    }

    #[test]
    fn test_full_name() {
        assert_eq!(create_test_employee().full_name(), "Ana Lopez");
    }

    #[test]
    fn test_override_lookup() {
        let mut employee = create_test_employee();
        employee.overrides.push(ConceptOverride {
            concept_code: "BONUS".to_string(),
            amount: Some(Decimal::from(500)),
            percentage: None,
        });
        assert!(employee.override_for("BONUS").is_some());
        assert!(employee.override_for("OTHER").is_none());
    }

    #[test]
    fn test_terminated_before_period_is_not_employed() {
        let mut employee = create_test_employee();
        employee.termination_date = NaiveDate::from_ymd_opt(2024, 12, 31);
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert!(!employee.is_employed_during(start, end));
    }

    #[test]
    fn test_hired_after_period_is_not_employed() {
        let employee = create_test_employee();
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        assert!(!employee.is_employed_during(start, end));
    }
}
