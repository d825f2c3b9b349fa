//! Perception calculation.

use rust_decimal::Decimal;

use super::{ConceptCalculator, Overrides, WarningCollector};
use crate::models::{ConceptAssignment, Employee, EmployeeCalculation, LineItem};

/// Applies every applicable perception to the employee calculation.
///
/// Each perception sees the gross salary including the perceptions applied
/// before it. Zero amounts produce no line.
pub fn apply_perceptions<'a, I>(
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
        let overrides = Overrides::resolve(assignment, employee);
        let amount = calculator.amount(calc, &assignment.concept, overrides, warnings);
        if amount > Decimal::ZERO {
            calc.add_item(LineItem::for_concept(&assignment.concept, amount));
        }
    }
}
