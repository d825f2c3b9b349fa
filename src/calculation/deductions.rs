//! Priority-ordered deduction calculation.

use rust_decimal::Decimal;

use super::{ConceptCalculator, InstallmentPlan, Overrides, WarningCollector};
use crate::models::{ConceptAssignment, Employee, EmployeeCalculation, LineItem};

enum Candidate<'a> {
    Concept(&'a ConceptAssignment),
    Installment { index: usize, priority: u32 },
}

impl Candidate<'_> {
    fn priority(&self) -> u32 {
        match self {
            Candidate::Concept(assignment) => assignment.concept.priority(),
            Candidate::Installment { priority, .. } => *priority,
        }
    }
}

/// Applies deductions in ascending priority against the available balance.
///
/// Concept deductions and the loan and advance installments in `installments`
/// form one candidate list. The available balance starts at gross salary
/// and shrinks with every applied deduction. Voluntary deductions and
/// installments are clipped to the balance and skipped with a warning when
/// nothing is left. Mandatory deductions are applied in full even when they
/// exhaust it. On equal priority concept deductions go first.
///
/// Amounts are computed in priority order, so a formula (e.g. income tax)
/// sees the deductions applied before it.
pub fn apply_deductions<'a, I>(
    calc: &mut EmployeeCalculation,
    employee: &Employee,
    assignments: I,
    installments: &mut InstallmentPlan<'_>,
    calculator: &ConceptCalculator<'_>,
    warnings: &mut WarningCollector,
) where
    I: IntoIterator<Item = &'a ConceptAssignment>,
{
    let mut candidates: Vec<Candidate<'a>> = assignments
        .into_iter()
        .filter(|a| calculator.is_applicable(a, warnings))
        .map(Candidate::Concept)
        .collect();
    candidates.extend(
        installments
            .priorities()
            .into_iter()
            .enumerate()
            .map(|(index, priority)| Candidate::Installment { index, priority }),
    );
    candidates.sort_by_key(|c| c.priority());

    for candidate in candidates {
        match candidate {
            Candidate::Concept(assignment) => apply_concept(calc, employee, assignment, calculator, warnings),
            Candidate::Installment { index, .. } => installments.collect(index, calc, warnings),
        }
    }
}

fn apply_concept(
    calc: &mut EmployeeCalculation,
    employee: &Employee,
    assignment: &ConceptAssignment,
    calculator: &ConceptCalculator<'_>,
    warnings: &mut WarningCollector,
) {
    let concept = &assignment.concept;
    let overrides = Overrides::resolve(assignment, employee);
    let requested = calculator.amount(calc, concept, overrides, warnings);
    if requested <= Decimal::ZERO {
        return;
    }

    let available = calc.available_balance();
    let applied = if concept.is_mandatory() {
        requested
    } else {
        requested.min(available)
    };

    if applied <= Decimal::ZERO {
        warnings.push_concept(
            &concept.code,
            format!("insufficient balance for deduction of {}; skipped", requested),
        );
        return;
    }
    if applied < requested {
        warnings.push_concept(
            &concept.code,
            format!("deduction clipped from {} to {}", requested, applied),
        );
    }
    calc.add_item(LineItem::for_concept(concept, applied));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::test_support::{assignment, calculation, deduction, definition, employee, loan};
    use crate::config::CalculationConfig;
    use crate::formula::{FormulaSchema, InputDef, Step};
    use crate::models::{ConceptKind, FormulaStrategy, LoanKind, RunSnapshot};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::str::FromStr;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn run<F: FnOnce(&ConceptCalculator<'_>)>(f: F) {
        let config = CalculationConfig::default();
        let snapshot = RunSnapshot::default();
        let calculator = ConceptCalculator::new(
            &config,
            &snapshot,
            &[],
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        );
        f(&calculator);
    }

    fn apply(
        calc: &mut EmployeeCalculation,
        assignments: &[ConceptAssignment],
        calculator: &ConceptCalculator<'_>,
        warnings: &mut WarningCollector,
    ) {
        let config = CalculationConfig::default();
        let mut none = InstallmentPlan::new(
            &[],
            &definition(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            &config,
        );
        apply_deductions(calc, &employee(), assignments, &mut none, calculator, warnings);
    }

    #[test]
    fn test_applied_in_priority_order() {
        run(|calculator| {
            let mut warnings = WarningCollector::new();
            let mut calc = calculation(dec("1000.00"));
            let assignments = vec![
                deduction("C", 30, false, dec("10")),
                deduction("A", 10, false, dec("10")),
                deduction("B", 20, false, dec("10")),
            ];
            apply(&mut calc, &assignments, calculator, &mut warnings);
            let codes: Vec<&str> = calc.deductions().iter().map(|d| d.code.as_str()).collect();
            assert_eq!(codes, vec!["A", "B", "C"]);
        });
    }

    #[test]
    fn test_voluntary_deductions_clip_to_balance() {
        run(|calculator| {
            let mut warnings = WarningCollector::new();
            let mut calc = calculation(dec("1000.00"));
            let assignments = vec![
                deduction("FIRST", 1, false, dec("700.00")),
                deduction("SECOND", 2, false, dec("500.00")),
                deduction("THIRD", 3, false, dec("100.00")),
            ];
            apply(&mut calc, &assignments, calculator, &mut warnings);

            assert_eq!(calc.deductions().len(), 2);
            assert_eq!(calc.deductions()[1].amount, dec("300.00"));
            assert_eq!(calc.net_pay(), Decimal::ZERO);
            assert_eq!(calc.raw_net_pay(), Decimal::ZERO);
            assert_eq!(warnings.len(), 2);
            assert!(warnings.entries()[1].message.contains("insufficient balance"));
        });
    }

    #[test]
    fn test_mandatory_deduction_may_exhaust_balance() {
        run(|calculator| {
            let mut warnings = WarningCollector::new();
            let mut calc = calculation(dec("1000.00"));
            let assignments = vec![
                deduction("LOAN", 1, false, dec("900.00")),
                deduction("TAX", 2, true, dec("300.00")),
            ];
            apply(&mut calc, &assignments, calculator, &mut warnings);

            assert_eq!(calc.total_deductions(), dec("1200.00"));
            assert_eq!(calc.raw_net_pay(), dec("-200.00"));
            assert_eq!(calc.net_pay(), Decimal::ZERO);
        });
    }

    #[test]
    fn test_tax_formula_sees_pre_tax_deduction() {
        run(|calculator| {
            let mut warnings = WarningCollector::new();
            let mut calc = calculation(dec("10000.00"));
            let inss = assignment(
                "INSS",
                ConceptKind::Deduction {
                    priority: 1,
                    mandatory: true,
                    is_tax: false,
                    pre_tax: true,
                },
                FormulaStrategy::PercentageOfGross { percentage: dec("7") },
            );
            let tax = assignment(
                "IR",
                ConceptKind::Deduction {
                    priority: 2,
                    mandatory: true,
                    is_tax: true,
                    pre_tax: false,
                },
                FormulaStrategy::Formula {
                    schema: FormulaSchema {
                        inputs: vec![InputDef {
                            name: "pre_tax_deductions".to_string(),
                            required: true,
                            default: None,
                        }],
                        steps: vec![Step::Calculation {
                            name: "tax".to_string(),
                            expression: "(taxable_income - pre_tax_deductions) * 0.1".to_string(),
                        }],
                        tax_tables: BTreeMap::new(),
                        output: None,
                    },
                },
            );

            apply(&mut calc, &[tax, inss], calculator, &mut warnings);
            assert_eq!(calc.deductions()[0].amount, dec("700.00"));
            assert_eq!(calc.deductions()[1].amount, dec("930.00"));
            assert_eq!(calc.pre_tax_deductions(), dec("700.00"));
            assert_eq!(calc.tax_withheld(), dec("930.00"));
        });
    }

    #[test]
    fn test_loan_installment_takes_its_turn_before_later_deduction() {
        run(|calculator| {
            let config = CalculationConfig::default();
            let mut warnings = WarningCollector::new();
            let mut calc = calculation(dec("1000.00"));
            let loans = vec![loan("LN-1", LoanKind::Loan, "5000.00", Some("500.00"), 0)];
            let mut plan = InstallmentPlan::new(
                &loans,
                &definition(),
                Uuid::new_v4(),
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                &config,
            );
            let union = deduction("UNION", 100, false, dec("1000.00"));
            apply_deductions(&mut calc, &employee(), [&union], &mut plan, calculator, &mut warnings);

            let lines: Vec<(&str, Decimal)> =
                calc.deductions().iter().map(|d| (d.code.as_str(), d.amount)).collect();
            assert_eq!(lines, vec![("LN-1", dec("500.00")), ("UNION", dec("500.00"))]);
            assert!(warnings.entries()[0].message.contains("clipped from 1000.00 to 500.00"));

            let outcome = plan.into_outcome();
            assert_eq!(outcome.payments.len(), 1);
            assert_eq!(outcome.updated[0].balance, dec("4500.00"));
        });
    }

    #[test]
    fn test_earlier_deduction_can_starve_installment() {
        run(|calculator| {
            let config = CalculationConfig::default();
            let mut warnings = WarningCollector::new();
            let mut calc = calculation(dec("1000.00"));
            let loans = vec![loan("LN-1", LoanKind::Loan, "5000.00", Some("500.00"), 0)];
            let mut plan = InstallmentPlan::new(
                &loans,
                &definition(),
                Uuid::new_v4(),
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                &config,
            );
            let rent = deduction("RENT", 10, false, dec("1000.00"));
            let tax = deduction("TAX", 95, true, dec("100.00"));
            apply_deductions(&mut calc, &employee(), [&tax, &rent], &mut plan, calculator, &mut warnings);

            let codes: Vec<&str> = calc.deductions().iter().map(|d| d.code.as_str()).collect();
            assert_eq!(codes, vec!["RENT", "TAX"]);
            assert!(warnings.entries()[0].message.contains("insufficient balance"));
            assert_eq!(warnings.entries()[0].concept_code.as_deref(), Some("LN-1"));
            assert!(plan.into_outcome().payments.is_empty());
        });
    }
}
