//! Append-only warning collection.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A non-blocking issue found while calculating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// The employee concerned, if any.
    pub employee_id: Option<String>,
    /// The concept concerned, if any.
    pub concept_code: Option<String>,
    /// What happened.
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.employee_id, &self.concept_code) {
            (Some(employee), Some(concept)) => {
                write!(f, "[{}] {}: {}", employee, concept, self.message)
            }
            (Some(employee), None) => write!(f, "[{}] {}", employee, self.message),
            (None, Some(concept)) => write!(f, "{}: {}", concept, self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// Collects warnings for one run.
///
/// The orchestrator owns the collector and lends it to calculators; entries
/// are only ever appended.
#[derive(Debug, Clone, Default)]
pub struct WarningCollector {
    entries: Vec<Warning>,
    employee_id: Option<String>,
}

impl WarningCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes subsequent warnings to an employee.
    pub fn set_employee(&mut self, employee_id: Option<&str>) {
        self.employee_id = employee_id.map(str::to_string);
    }

    /// Records a warning for the current employee.
    pub fn push(&mut self, message: impl Into<String>) {
        self.record(None, message.into());
    }

    /// Records a warning about a concept for the current employee.
    pub fn push_concept(&mut self, concept_code: &str, message: impl Into<String>) {
        self.record(Some(concept_code.to_string()), message.into());
    }

    fn record(&mut self, concept_code: Option<String>, message: String) {
        let warning = Warning {
            employee_id: self.employee_id.clone(),
            concept_code,
            message,
        };
        warn!(
            employee_id = ?warning.employee_id,
            concept = ?warning.concept_code,
            "{}",
            warning.message
        );
        self.entries.push(warning);
    }

    /// Number of warnings recorded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Warnings recorded from position `from` onwards.
    pub fn since(&self, from: usize) -> &[Warning] {
        self.entries.get(from..).unwrap_or(&[])
    }

    /// Drops warnings recorded from position `from` onwards.
    ///
    /// Used when an employee's processing is rolled back.
    pub fn truncate(&mut self, from: usize) {
        self.entries.truncate(from);
    }

    /// All warnings recorded.
    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    /// Consumes the collector, returning the warnings.
    pub fn into_entries(self) -> Vec<Warning> {
        self.entries
    }
}
