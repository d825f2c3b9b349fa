//! Response types for the payroll API.
//!
//! This module defines the response bodies, the error response structure
//! and the mapping from engine errors to HTTP statuses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{PayrollRun, RunStatus, RunTotals};

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }

    /// Creates an invalid identifier error response.
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::new("INVALID_ID", message)
    }
}

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// Pairs an error body with a status.
    pub fn new(status: StatusCode, error: ApiError) -> Self {
        Self { status, error }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        let message = error.to_string();
        let (status, code) = match &error {
            EngineError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            EngineError::Calculation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "CALCULATION_ERROR"),
            EngineError::FormulaEvaluation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "FORMULA_ERROR"),
            EngineError::Transient { .. } => (StatusCode::SERVICE_UNAVAILABLE, "TRANSIENT_ERROR"),
            EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            EngineError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            EngineError::LockHeld { .. } => (StatusCode::CONFLICT, "LOCK_HELD"),
            EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR")
            }
        };
        let body = if error.is_recoverable() {
            ApiError::with_details(code, message, "The operation may succeed if retried")
        } else {
            ApiError::new(code, message)
        };
        Self::new(status, body)
    }
}

impl From<Vec<EngineError>> for ApiErrorResponse {
    fn from(errors: Vec<EngineError>) -> Self {
        match <[EngineError; 1]>::try_from(errors) {
            Ok([single]) => single.into(),
            Err(errors) => {
                let details = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
                Self::new(
                    StatusCode::BAD_REQUEST,
                    ApiError::with_details(
                        "VALIDATION_ERROR",
                        format!("Payroll run rejected with {} errors", errors.len()),
                        details,
                    ),
                )
            }
        }
    }
}

/// Summary returned by execute and lifecycle endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// The run.
    pub run_id: Uuid,
    /// Its status.
    pub status: RunStatus,
    /// Background job token, when queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    /// Aggregate totals.
    pub totals: RunTotals,
    /// Employee and batch errors.
    pub errors: Vec<String>,
    /// Warnings.
    pub warnings: Vec<String>,
}

impl RunSummary {
    /// Summarises a run, appending an optional batch-level error.
    pub fn from_run(run: &PayrollRun, batch_error: Option<&EngineError>) -> Self {
        let mut errors: Vec<String> = run
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.employee_id, e.message))
            .collect();
        errors.extend(batch_error.map(ToString::to_string));
        Self {
            run_id: run.id,
            status: run.status,
            job_id: run.job_id,
            totals: run.totals.clone(),
            errors,
            warnings: run.warnings.clone(),
        }
    }
}

/// Body returned by the retry endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryResponse {
    /// Whether the retry was accepted.
    pub success: bool,
    /// What happened.
    pub message: String,
    /// The run.
    pub run_id: Uuid,
    /// The new job token.
    pub job_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::new("TEST_ERROR", "Test message");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"code\":\"TEST_ERROR\""));
        assert!(json.contains("\"message\":\"Test message\""));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_engine_error_statuses() {
        let not_found: ApiErrorResponse = EngineError::not_found("payroll definition", "X").into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let locked: ApiErrorResponse = EngineError::LockHeld {
            run_id: "r".to_string(),
        }
        .into();
        assert_eq!(locked.status, StatusCode::CONFLICT);
        assert_eq!(locked.error.code, "LOCK_HELD");
        assert!(locked.error.details.is_some());

        let transition: ApiErrorResponse = EngineError::InvalidTransition {
            from: "generated".to_string(),
            to: "paid".to_string(),
        }
        .into();
        assert_eq!(transition.error.code, "INVALID_TRANSITION");
        assert!(transition.error.details.is_none());
    }

    #[test]
    fn test_error_list_collapses_single_error() {
        let single: ApiErrorResponse = vec![EngineError::validation("no employees")].into();
        assert_eq!(single.error.code, "VALIDATION_ERROR");
        assert!(single.error.details.is_none());

        let many: ApiErrorResponse = vec![
            EngineError::validation("inactive"),
            EngineError::validation("no employees"),
        ]
        .into();
        assert_eq!(many.status, StatusCode::BAD_REQUEST);
        assert!(many.error.message.contains("2 errors"));
        assert!(many.error.details.unwrap().contains("no employees"));
    }
}
