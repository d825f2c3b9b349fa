//! Line items produced for an employee during a run.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Concept, ConceptKind};

/// Which list a line item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// An addition to gross pay.
    Perception,
    /// A subtraction from gross pay.
    Deduction,
    /// An employer-borne cost.
    Benefit,
}

/// How a line item feeds the tax accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxTreatment {
    /// No tax effect.
    #[default]
    None,
    /// A perception counted in the taxable base.
    Taxable,
    /// A deduction that is itself an income-tax withholding.
    Tax,
    /// A deduction that reduces the taxable base.
    PreTax,
}

/// An immutable computed line on an employee's payslip.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{LineItem, LineKind, TaxTreatment};
/// use rust_decimal::Decimal;
///
/// let item = LineItem::perception("BONUS", "Bonus", Decimal::from(1000), true);
/// assert_eq!(item.kind, LineKind::Perception);
/// assert_eq!(item.tax_treatment, TaxTreatment::Taxable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line code (the concept code, or a loan reference).
    pub code: String,
    /// Display name.
    pub name: String,
    /// Perception, deduction or benefit.
    pub kind: LineKind,
    /// The computed amount, always non-negative.
    pub amount: Decimal,
    /// Ordering priority; meaningful for deductions.
    pub priority: u32,
    /// The originating concept, if any.
    #[serde(default)]
    pub concept_code: Option<String>,
    /// The originating loan or advance, if any.
    #[serde(default)]
    pub loan_id: Option<String>,
    /// Tax classification.
    #[serde(default)]
    pub tax_treatment: TaxTreatment,
    /// Mandatory deductions may exhaust the available balance.
    #[serde(default)]
    pub mandatory: bool,
}

impl LineItem {
    /// Creates a perception line without a backing concept.
    pub fn perception(
        code: impl Into<String>,
        name: impl Into<String>,
        amount: Decimal,
        taxable: bool,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind: LineKind::Perception,
            amount,
            priority: 0,
            concept_code: None,
            loan_id: None,
            tax_treatment: if taxable {
                TaxTreatment::Taxable
            } else {
                TaxTreatment::None
            },
            mandatory: false,
        }
    }

    /// Creates a line for a concept, deriving kind, priority and tax treatment.
    pub fn for_concept(concept: &Concept, amount: Decimal) -> Self {
        let (kind, priority, mandatory, tax_treatment) = match concept.kind {
            ConceptKind::Perception { taxable } => (
                LineKind::Perception,
                0,
                false,
                if taxable {
                    TaxTreatment::Taxable
                } else {
                    TaxTreatment::None
                },
            ),
            ConceptKind::Deduction {
                priority,
                mandatory,
                is_tax,
                pre_tax,
            } => {
                let treatment = if is_tax {
                    TaxTreatment::Tax
                } else if pre_tax {
                    TaxTreatment::PreTax
                } else {
                    TaxTreatment::None
                };
                (LineKind::Deduction, priority, mandatory, treatment)
            }
            ConceptKind::Benefit { .. } => (LineKind::Benefit, 0, false, TaxTreatment::None),
        };

        Self {
            code: concept.code.clone(),
            name: concept.name.clone(),
            kind,
            amount,
            priority,
            concept_code: Some(concept.code.clone()),
            loan_id: None,
            tax_treatment,
            mandatory,
        }
    }

    /// Creates a voluntary deduction line for a loan or advance installment.
    pub fn loan_installment(
        loan_id: impl Into<String>,
        name: impl Into<String>,
        amount: Decimal,
        priority: u32,
    ) -> Self {
        let loan_id = loan_id.into();
        Self {
            code: loan_id.clone(),
            name: name.into(),
            kind: LineKind::Deduction,
            amount,
            priority,
            concept_code: None,
            loan_id: Some(loan_id),
            tax_treatment: TaxTreatment::None,
            mandatory: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConceptStatus, FormulaStrategy};

    fn concept(kind: ConceptKind) -> Concept {
        Concept {
            code: "IR".to_string(),
            name: "Income tax".to_string(),
            kind,
            formula: FormulaStrategy::Fixed {
                amount: Decimal::ZERO,
            },
            effective_from: None,
            effective_to: None,
            status: ConceptStatus::Approved,
            active: true,
            created_by_plugin: false,
            version: 1,
        }
    }

    #[test]
    fn test_tax_deduction_line() {
        let c = concept(ConceptKind::Deduction {
            priority: 2,
            mandatory: true,
            is_tax: true,
            pre_tax: false,
        });
        let item = LineItem::for_concept(&c, Decimal::from(100));
        assert_eq!(item.kind, LineKind::Deduction);
        assert_eq!(item.priority, 2);
        assert!(item.mandatory);
        assert_eq!(item.tax_treatment, TaxTreatment::Tax);
        assert_eq!(item.concept_code.as_deref(), Some("IR"));
    }

    #[test]
    fn test_benefit_line_has_no_tax_effect() {
        let c = concept(ConceptKind::Benefit { ceiling: None });
        let item = LineItem::for_concept(&c, Decimal::from(50));
        assert_eq!(item.kind, LineKind::Benefit);
        assert_eq!(item.tax_treatment, TaxTreatment::None);
    }

    #[test]
    fn test_loan_installment_is_voluntary() {
        let item = LineItem::loan_installment("LN-1", "Loan LN-1", Decimal::from(500), 90);
        assert!(!item.mandatory);
        assert_eq!(item.loan_id.as_deref(), Some("LN-1"));
        assert_eq!(item.priority, 90);
    }

    #[test]
    fn test_line_kind_serialization() {
        let json = serde_json::to_string(&LineKind::Perception).unwrap();
        assert_eq!(json, "\"perception\"");
        let json = serde_json::to_string(&TaxTreatment::PreTax).unwrap();
        assert_eq!(json, "\"pre_tax\"");
    }
}
