//! Employer benefit (prestacion) calculation.

use rust_decimal::Decimal;

use super::{ConceptCalculator, Overrides, WarningCollector};
use crate::models::{ConceptAssignment, ConceptKind, Employee, EmployeeCalculation, LineItem};

/// Applies every applicable benefit, capping each at its ceiling.
pub fn apply_benefits<'a, I>(
    calc: &mut EmployeeCalculation,
    employee: &Employee,
    assignments: I,
    calculator: &ConceptCalculator<'_>,
    warnings: &mut WarningCollector,
) where
    I: IntoIterator<Item = &'a ConceptAssignment>,
{
    for assignment in assignments {
        if !calculator.is_applicable(assignment, warnings) {
            continue;
        }
        let concept = &assignment.concept;
        let overrides = Overrides::resolve(assignment, employee);
        let mut amount = calculator.amount(calc, concept, overrides, warnings);
        if let ConceptKind::Benefit {
            ceiling: Some(ceiling),
        } = concept.kind
        {
            amount = amount.min(ceiling);
        }
        if amount > Decimal::ZERO {
            calc.add_item(LineItem::for_concept(concept, amount));
        }
    }
}
