//! Payroll concepts: perceptions, deductions and benefits.
//!
//! A [`Concept`] is a named, versioned payroll rule. Its [`ConceptKind`]
//! carries the variant-specific fields (deduction priority and mandatory
//! flag, benefit ceiling), and its [`FormulaStrategy`] selects how the
//! amount is computed.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::formula::FormulaSchema;

/// The approval state of a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptStatus {
    /// Editable, not yet consumable by payroll runs.
    #[default]
    Draft,
    /// Approved for use in payroll runs.
    Approved,
}

/// What a concept does to an employee's pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConceptKind {
    /// An addition to gross pay.
    Perception {
        /// Whether the amount counts toward the taxable income base.
        #[serde(default)]
        taxable: bool,
    },
    /// A subtraction from gross pay.
    Deduction {
        /// Application order; lower numbers are applied first.
        priority: u32,
        /// Mandatory deductions are applied in full even when they exhaust the balance.
        #[serde(default)]
        mandatory: bool,
        /// The deduction is itself an income-tax withholding.
        #[serde(default)]
        is_tax: bool,
        /// The deduction reduces the taxable base (e.g. social security).
        #[serde(default)]
        pre_tax: bool,
    },
    /// An employer-borne cost that does not affect net pay.
    Benefit {
        /// Maximum amount per period, if capped.
        #[serde(default)]
        ceiling: Option<Decimal>,
    },
}

/// How a concept's amount is computed.
///
/// Percentages are expressed in hundredths: 7 means 7%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum FormulaStrategy {
    /// A fixed amount per period.
    Fixed {
        /// The amount.
        amount: Decimal,
    },
    /// A percentage of the period base salary.
    PercentageOfSalary {
        /// The percentage.
        percentage: Decimal,
    },
    /// A percentage of gross salary (base plus perceptions so far).
    PercentageOfGross {
        /// The percentage.
        percentage: Decimal,
    },
    /// Novelty hours multiplied by the hourly rate.
    Hours {
        /// Optional scaling percentage (200 pays double time).
        #[serde(default)]
        percentage: Option<Decimal>,
    },
    /// Novelty days multiplied by the daily rate.
    Days {
        /// Optional scaling percentage.
        #[serde(default)]
        percentage: Option<Decimal>,
    },
    /// An inline calculation schema.
    Formula {
        /// The schema evaluated against the employee context.
        schema: FormulaSchema,
    },
    /// A calculation rule resolved from the run snapshot or by concept linkage.
    Rule {
        /// The rule code; when absent the rule linked to the concept is used.
        #[serde(default)]
        rule_code: Option<String>,
    },
}

/// A configured payroll rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Unique concept code (e.g. "INSS").
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Perception, deduction or benefit, with variant-specific fields.
    pub kind: ConceptKind,
    /// How the amount is computed.
    pub formula: FormulaStrategy,
    /// First date the concept applies.
    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
    /// Last date the concept applies.
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    /// Approval status.
    #[serde(default)]
    pub status: ConceptStatus,
    /// Whether the concept is active.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Concepts installed by plugins stay approved when edited.
    #[serde(default)]
    pub created_by_plugin: bool,
    /// Incremented on every edit.
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

impl Concept {
    /// Returns true when `date` lies inside the concept's validity window.
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from.is_none_or(|from| from <= date)
            && self.effective_to.is_none_or(|to| date <= to)
    }

    /// Returns true when the concept is active and approved.
    pub fn is_usable(&self) -> bool {
        self.active && self.status == ConceptStatus::Approved
    }

    /// Marks the concept approved.
    pub fn approve(&mut self) {
        self.status = ConceptStatus::Approved;
    }

    /// Applies an edit, bumping the version.
    ///
    /// Editing an approved concept reverts it to draft unless it was
    /// created by a plugin.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::models::{Concept, ConceptKind, ConceptStatus, FormulaStrategy};
    /// use rust_decimal::Decimal;
    ///
    /// let mut concept = Concept {
    ///     code: "BONUS".to_string(),
    ///     name: "Bonus".to_string(),
    ///     kind: ConceptKind::Perception { taxable: true },
    ///     formula: FormulaStrategy::Fixed { amount: Decimal::from(100) },
    ///     effective_from: None,
    ///     effective_to: None,
    ///     status: ConceptStatus::Approved,
    ///     active: true,
    ///     created_by_plugin: false,
    ///     version: 1,
    /// };
    /// concept.edit(|c| c.name = "Annual bonus".to_string());
    /// assert_eq!(concept.status, ConceptStatus::Draft);
    /// assert_eq!(concept.version, 2);
    /// ```
    pub fn edit<F: FnOnce(&mut Concept)>(&mut self, change: F) {
        change(self);
        self.version += 1;
        if self.status == ConceptStatus::Approved && !self.created_by_plugin {
            self.status = ConceptStatus::Draft;
        }
    }

    /// Deduction priority; non-deductions sort last.
    pub fn priority(&self) -> u32 {
        match self.kind {
            ConceptKind::Deduction { priority, .. } => priority,
            _ => u32::MAX,
        }
    }

    /// Returns true for mandatory deductions.
    pub fn is_mandatory(&self) -> bool {
        matches!(self.kind, ConceptKind::Deduction { mandatory: true, .. })
    }
}

/// A named, reusable calculation rule that concepts can link to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRule {
    /// Unique rule code.
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// The concept codes this rule computes.
    #[serde(default)]
    pub concept_codes: Vec<String>,
    /// The calculation schema.
    pub schema: FormulaSchema,
    /// First date the rule applies.
    #[serde(default)]
    pub effective_from: Option<NaiveDate>,
    /// Last date the rule applies.
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    /// Whether the rule is active.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl CalculationRule {
    /// Returns true when the rule is active on `date`.
    pub fn is_effective_on(&self, date: NaiveDate) -> bool {
        self.active
            && self.effective_from.is_none_or(|from| from <= date)
            && self.effective_to.is_none_or(|to| date <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_deduction(status: ConceptStatus, plugin: bool) -> Concept {
        Concept {
            code: "INSS".to_string(),
            name: "Social security".to_string(),
            kind: ConceptKind::Deduction {
                priority: 1,
                mandatory: true,
                is_tax: false,
                pre_tax: true,
            },
            formula: FormulaStrategy::PercentageOfGross {
                percentage: Decimal::from(7),
            },
            effective_from: NaiveDate::from_ymd_opt(2025, 1, 1),
            effective_to: NaiveDate::from_ymd_opt(2025, 12, 31),
            status,
            active: true,
            created_by_plugin: plugin,
            version: 1,
        }
    }

    #[test]
    fn test_deserialize_concept_from_yaml() {
        let yaml = r#"
code: INSS
name: Social security
kind:
  type: deduction
  priority: 1
  mandatory: true
  pre_tax: true
formula:
  strategy: percentage_of_gross
  percentage: "7"
status: approved
"#;
        let concept: Concept = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(concept.priority(), 1);
        assert!(concept.is_mandatory());
        assert!(concept.is_usable());
        assert_eq!(concept.version, 1);
        assert_eq!(
            concept.formula,
            FormulaStrategy::PercentageOfGross {
                percentage: Decimal::from(7)
            }
        );
    }

    #[test]
    fn test_effective_window() {
        let concept = sample_deduction(ConceptStatus::Approved, false);
        assert!(concept.is_effective_on(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()));
        assert!(!concept.is_effective_on(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
        assert!(!concept.is_effective_on(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    }

    #[test]
    fn test_editing_approved_concept_reverts_to_draft() {
        let mut concept = sample_deduction(ConceptStatus::Approved, false);
        concept.edit(|c| c.name = "INSS laboral".to_string());
        assert_eq!(concept.status, ConceptStatus::Draft);
        assert!(!concept.is_usable());
    }

    #[test]
    fn test_editing_plugin_concept_stays_approved() {
        let mut concept = sample_deduction(ConceptStatus::Approved, true);
        concept.edit(|c| c.name = "INSS laboral".to_string());
        assert_eq!(concept.status, ConceptStatus::Approved);
        assert_eq!(concept.version, 2);
    }

    #[test]
    fn test_non_deductions_sort_last() {
        let mut concept = sample_deduction(ConceptStatus::Approved, false);
        concept.kind = ConceptKind::Benefit { ceiling: None };
        assert_eq!(concept.priority(), u32::MAX);
        assert!(!concept.is_mandatory());
    }
}
