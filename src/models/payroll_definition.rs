//! Payroll definitions (planillas) and payroll types.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Concept, ConceptKind, Employee};

/// How often a payroll definition is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Periodicity {
    /// Once per calendar month.
    Monthly,
    /// Twice per calendar month.
    Biweekly,
    /// Every week.
    Weekly,
    /// A fixed number of days.
    Custom {
        /// Length of each period in days.
        days: u32,
    },
}

impl Periodicity {
    /// Number of pay periods in a year.
    pub fn periods_per_year(&self) -> u32 {
        match self {
            Self::Monthly => 12,
            Self::Biweekly => 24,
            Self::Weekly => 52,
            Self::Custom { days } => (DAYS_PER_YEAR / (*days).max(1)).max(1),
        }
    }
}

const DAYS_PER_YEAR: u32 = 365;

/// A payroll type: periodicity plus fiscal-year configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollType {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Pay periodicity.
    pub periodicity: Periodicity,
    /// Month (1-12) on which the fiscal year starts.
    #[serde(default = "default_one")]
    pub fiscal_year_start_month: u32,
    /// Day of month on which the fiscal year starts.
    #[serde(default = "default_one")]
    pub fiscal_year_start_day: u32,
    /// Overrides the periodicity's number of periods per year.
    #[serde(default)]
    pub periods_per_year: Option<u32>,
}

fn default_one() -> u32 {
    1
}

impl PayrollType {
    /// Number of pay periods per year for tax annualization.
    pub fn periods_per_year(&self) -> u32 {
        self.periods_per_year
            .unwrap_or_else(|| self.periodicity.periods_per_year())
    }

    /// Returns the start date of the fiscal year containing `date`.
    ///
    /// An invalid configured start (e.g. February 30) is clamped to the last
    /// day of the configured month.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::models::{PayrollType, Periodicity};
    /// use chrono::NaiveDate;
    ///
    /// let payroll_type = PayrollType {
    ///     id: "monthly".to_string(),
    ///     name: "Monthly".to_string(),
    ///     periodicity: Periodicity::Monthly,
    ///     fiscal_year_start_month: 7,
    ///     fiscal_year_start_day: 1,
    ///     periods_per_year: None,
    /// };
    /// let date = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
    /// assert_eq!(payroll_type.fiscal_year_start(date), NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
    /// ```
    pub fn fiscal_year_start(&self, date: NaiveDate) -> NaiveDate {
        let this_year = fiscal_start_in(
            date.year(),
            self.fiscal_year_start_month,
            self.fiscal_year_start_day,
        );
        if date >= this_year {
            this_year
        } else {
            fiscal_start_in(
                date.year() - 1,
                self.fiscal_year_start_month,
                self.fiscal_year_start_day,
            )
        }
    }
}

fn fiscal_start_in(year: i32, month: u32, day: u32) -> NaiveDate {
    let month = month.clamp(1, 12);
    let mut day = day.clamp(1, 31);
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return date;
        }
        if day == 1 {
            return NaiveDate::MIN;
        }
        day -= 1;
    }
}

/// A concept linked to a payroll definition, with optional overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptAssignment {
    /// The linked concept.
    pub concept: Concept,
    /// An explicit amount that wins outright.
    #[serde(default)]
    pub amount_override: Option<Decimal>,
    /// A percentage applied to base salary instead of the concept's own.
    #[serde(default)]
    pub percentage_override: Option<Decimal>,
    /// Whether the link is active.
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// A payroll definition (planilla).
///
/// Immutable input to a run: employees, concepts and linked rules are all
/// eagerly available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollDefinition {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The owning company.
    pub company_id: String,
    /// The currency the payroll is paid in.
    #[serde(default)]
    pub currency: Option<String>,
    /// The payroll type (periodicity and fiscal year).
    #[serde(default)]
    pub payroll_type: Option<PayrollType>,
    /// Whether the definition is active.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Employees linked to the definition.
    #[serde(default)]
    pub employees: Vec<Employee>,
    /// Linked concepts of every kind.
    #[serde(default)]
    pub concepts: Vec<ConceptAssignment>,
    /// Deduct active loan installments automatically.
    #[serde(default = "default_true")]
    pub apply_loans: bool,
    /// Deduct active advance installments automatically.
    #[serde(default = "default_true")]
    pub apply_advances: bool,
    /// Deduction priority given to loan installments.
    #[serde(default = "default_loan_priority")]
    pub loan_priority: u32,
    /// Deduction priority given to advance installments.
    #[serde(default = "default_advance_priority")]
    pub advance_priority: u32,
}

fn default_loan_priority() -> u32 {
    90
}

fn default_advance_priority() -> u32 {
    91
}

impl PayrollDefinition {
    /// Linked perception assignments.
    pub fn perceptions(&self) -> impl Iterator<Item = &ConceptAssignment> {
        self.concepts
            .iter()
            .filter(|a| matches!(a.concept.kind, ConceptKind::Perception { .. }))
    }

    /// Linked deduction assignments.
    pub fn deductions(&self) -> impl Iterator<Item = &ConceptAssignment> {
        self.concepts
            .iter()
            .filter(|a| matches!(a.concept.kind, ConceptKind::Deduction { .. }))
    }

    /// Linked benefit assignments.
    pub fn benefits(&self) -> impl Iterator<Item = &ConceptAssignment> {
        self.concepts
            .iter()
            .filter(|a| matches!(a.concept.kind, ConceptKind::Benefit { .. }))
    }

    /// Finds a linked employee by id.
    pub fn employee(&self, employee_id: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == employee_id)
    }

    /// Periodicity of the definition, defaulting to monthly when no type is set.
    pub fn periodicity(&self) -> Periodicity {
        self.payroll_type
            .as_ref()
            .map(|t| t.periodicity)
            .unwrap_or(Periodicity::Monthly)
    }
}
