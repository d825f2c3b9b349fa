//! Run-level checks performed before any employee is processed.

use crate::error::EngineError;
use crate::models::{PayPeriod, PayrollDefinition, PayrollRun};

/// Checks that a definition can be executed for `period`.
///
/// Every failed check is reported, not just the first one. A period
/// overlapping a run that still holds its period (anything but a cancelled
/// run) is rejected.
pub fn precheck(
    definition: &PayrollDefinition,
    period: &PayPeriod,
    existing_runs: &[PayrollRun],
) -> Result<(), Vec<EngineError>> {
    let mut errors = Vec::new();

    if !definition.active {
        errors.push(EngineError::validation(format!(
            "payroll definition {} is inactive",
            definition.id
        )));
    }
    if definition.employees.is_empty() {
        errors.push(EngineError::validation(format!(
            "payroll definition {} has no employees",
            definition.id
        )));
    }
    if definition.payroll_type.is_none() {
        errors.push(EngineError::validation(format!(
            "payroll definition {} has no payroll type",
            definition.id
        )));
    }
    if definition.currency.as_deref().is_none_or(str::is_empty) {
        errors.push(EngineError::validation(format!(
            "payroll definition {} has no currency",
            definition.id
        )));
    }

    for run in existing_runs {
        if run.definition_id == definition.id
            && run.status.reserves_period()
            && run.period.overlaps(period)
        {
            errors.push(EngineError::validation(format!(
                "period {} to {} overlaps run {} ({}) for {} to {}",
                period.start_date,
                period.end_date,
                run.id,
                run.status,
                run.period.start_date,
                run.period.end_date
            )));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
