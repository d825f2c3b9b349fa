//! Request types for the payroll API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::ExecutionRequest;

/// Request body for `POST /payrolls/{id}/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutePayrollRequest {
    /// First day of the period.
    pub period_start: NaiveDate,
    /// Last day of the period.
    pub period_end: NaiveDate,
    /// Calculation date; defaults to the period end.
    #[serde(default)]
    pub calculation_date: Option<NaiveDate>,
    /// Who requested the run.
    #[serde(default)]
    pub user: Option<String>,
    /// Queue the run on the background worker instead of waiting for it.
    #[serde(default)]
    pub background: bool,
}

impl ExecutePayrollRequest {
    /// Binds the request to a payroll definition.
    pub fn into_execution(self, definition_id: impl Into<String>) -> ExecutionRequest {
        ExecutionRequest {
            definition_id: definition_id.into(),
            period_start: self.period_start,
            period_end: self.period_end,
            calculation_date: self.calculation_date,
            user: self.user,
        }
    }
}

/// Request body for run actions such as approve and retry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunActionRequest {
    /// Who performs the action.
    #[serde(default)]
    pub user: Option<String>,
}
