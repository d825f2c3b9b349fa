//! HTTP request handlers for the payroll API.
//!
//! This module contains the handler functions for all API endpoints.

use std::sync::MutexGuard;
use std::time::Instant;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::BatchRunner;
use crate::engine::{PayrollEngine, PayrollRepository};
use crate::error::EngineError;

use super::request::{ExecutePayrollRequest, RunActionRequest};
use super::response::{ApiError, ApiErrorResponse, RetryResponse, RunSummary};
use super::state::AppState;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/payrolls/:id/execute", post(execute_handler))
        .route("/runs/:id", get(get_run_handler))
        .route("/runs/:id/progress", get(progress_handler))
        .route("/runs/:id/approve", post(approve_handler))
        .route("/runs/:id/retry", post(retry_handler))
        .with_state(state)
}

/// Handler for `POST /payrolls/{id}/execute`.
///
/// Runs the payroll inline and returns the run summary, or queues it on the
/// background worker and answers `202 Accepted`.
async fn execute_handler(
    State(state): State<AppState>,
    Path(definition_id): Path<String>,
    payload: Result<Json<ExecutePayrollRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, definition_id = %definition_id, "Processing execute request");

    let request = match parse_body(payload, correlation_id) {
        Ok(request) => request,
        Err(rejection) => return rejection.into_response(),
    };
    let background = request.background;
    let execution = request.into_execution(definition_id);

    if background {
        let Some(worker) = state.worker() else {
            return ApiErrorResponse::new(
                StatusCode::BAD_REQUEST,
                ApiError::validation_error("Background execution is not enabled"),
            )
            .into_response();
        };
        let runner = state.runner().clone();
        let job = match blocking(move || runner.submit(&execution).map_err(ApiErrorResponse::from)).await {
            Ok(job) => job,
            Err(err) => return log_failure(correlation_id, err),
        };
        if let Err(err) = worker.enqueue(job) {
            return log_failure(correlation_id, err.into());
        }
        info!(correlation_id = %correlation_id, run_id = %job.run_id, job_id = %job.job_id, "Payroll run queued");
        return json_response(StatusCode::ACCEPTED, &job);
    }

    let start_time = Instant::now();
    let runner = state.runner().clone();
    let result = blocking(move || {
        let job = runner.submit(&execution)?;
        let batch_error = runner.process(job).err();
        let run = lock_repo(&runner)?.get_run(job.run_id)?;
        Ok(RunSummary::from_run(&run, batch_error.as_ref()))
    })
    .await;

    match result {
        Ok(summary) => {
            info!(
                correlation_id = %correlation_id,
                run_id = %summary.run_id,
                status = %summary.status,
                employees = summary.totals.employee_count,
                net = %summary.totals.net,
                duration_us = start_time.elapsed().as_micros(),
                "Payroll run completed"
            );
            json_response(StatusCode::OK, &summary)
        }
        Err(err) => log_failure(correlation_id, err),
    }
}

/// Handler for `GET /runs/{id}`.
async fn get_run_handler(
    State(state): State<AppState>,
    run_id: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let run_id = match parse_run_id(run_id) {
        Ok(run_id) => run_id,
        Err(err) => return err.into_response(),
    };
    let runner = state.runner().clone();
    let result = blocking(move || {
        let run = lock_repo(&runner)?.get_run(run_id)?;
        Ok(run)
    })
    .await;
    match result {
        Ok(run) => json_response(StatusCode::OK, &run),
        Err(err) => err.into_response(),
    }
}

/// Handler for `GET /runs/{id}/progress`.
///
/// Reads the progress store only, so it answers while a batch is running.
async fn progress_handler(
    State(state): State<AppState>,
    run_id: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let run_id = match parse_run_id(run_id) {
        Ok(run_id) => run_id,
        Err(err) => return err.into_response(),
    };
    match state.runner().progress().get(run_id) {
        Some(progress) => json_response(StatusCode::OK, &progress),
        None => ApiErrorResponse::from(EngineError::not_found("run progress", run_id)).into_response(),
    }
}

/// Handler for `POST /runs/{id}/approve`.
async fn approve_handler(
    State(state): State<AppState>,
    run_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RunActionRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let (run_id, action) = match parse_run_id(run_id).and_then(|id| Ok((id, parse_body(payload, correlation_id)?))) {
        Ok(parsed) => parsed,
        Err(err) => return err.into_response(),
    };

    let runner = state.runner().clone();
    let result = blocking(move || {
        let mut repo = lock_repo(&runner)?;
        let run = PayrollEngine::new(&mut *repo).approve(run_id, action.user.as_deref())?;
        Ok(RunSummary::from_run(&run, None))
    })
    .await;

    match result {
        Ok(summary) => {
            info!(correlation_id = %correlation_id, run_id = %run_id, "Payroll run approved");
            json_response(StatusCode::OK, &summary)
        }
        Err(err) => log_failure(correlation_id, err),
    }
}

/// Handler for `POST /runs/{id}/retry`.
///
/// Resets a failed run and reprocesses it on the worker when one is
/// running, inline otherwise.
async fn retry_handler(
    State(state): State<AppState>,
    run_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RunActionRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4();
    let (run_id, action) = match parse_run_id(run_id).and_then(|id| Ok((id, parse_body(payload, correlation_id)?))) {
        Ok(parsed) => parsed,
        Err(err) => return err.into_response(),
    };

    let runner = state.runner().clone();
    let job = match blocking(move || Ok(runner.retry(run_id, action.user.as_deref())?)).await {
        Ok(job) => job,
        Err(err) => return log_failure(correlation_id, err),
    };

    let message = match state.worker() {
        Some(worker) => match worker.enqueue(job) {
            Ok(()) => "Run requeued for processing".to_string(),
            Err(err) => return log_failure(correlation_id, err.into()),
        },
        None => {
            let runner = state.runner().clone();
            match blocking(move || Ok(runner.process(job).map(|run| run.status))).await {
                Ok(Ok(status)) => format!("Run reprocessed with status {}", status),
                Ok(Err(err)) => format!("Run failed again: {}", err),
                Err(err) => return log_failure(correlation_id, err),
            }
        }
    };

    info!(correlation_id = %correlation_id, run_id = %run_id, job_id = %job.job_id, "Payroll run retried");
    json_response(
        StatusCode::OK,
        &RetryResponse {
            success: true,
            message,
            run_id,
            job_id: job.job_id,
        },
    )
}

/// Maps a JSON rejection to an API error the way every endpoint reports it.
fn parse_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: Uuid,
) -> Result<T, ApiErrorResponse> {
    let rejection = match payload {
        Ok(Json(body)) => return Ok(body),
        Err(rejection) => rejection,
    };
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            let body_text = err.body_text();
            warn!(correlation_id = %correlation_id, error = %body_text, "JSON data error");
            if body_text.contains("missing field") {
                ApiError::validation_error(body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(correlation_id = %correlation_id, error = %err, "JSON syntax error");
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    Err(ApiErrorResponse::new(StatusCode::BAD_REQUEST, error))
}

fn parse_run_id(run_id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiErrorResponse> {
    run_id.map(|Path(id)| id).map_err(|rejection| {
        ApiErrorResponse::new(StatusCode::BAD_REQUEST, ApiError::invalid_id(rejection.body_text()))
    })
}

/// Runs repository work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, ApiErrorResponse>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiErrorResponse> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        ApiErrorResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::with_details("INTERNAL_ERROR", "Request processing failed", err.to_string()),
        )
    })?
}

fn lock_repo<R: PayrollRepository>(runner: &BatchRunner<R>) -> Result<MutexGuard<'_, R>, EngineError> {
    runner
        .repository()
        .lock()
        .map_err(|_| EngineError::transient("repository lock poisoned"))
}

fn log_failure(correlation_id: Uuid, err: ApiErrorResponse) -> Response {
    warn!(
        correlation_id = %correlation_id,
        code = %err.error.code,
        error = %err.error.message,
        "Request failed"
    );
    err.into_response()
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::request::ExecutePayrollRequest;
    use crate::batch::JobProgress;
    use crate::engine::test_support::{definition, employee, repository};
    use crate::models::{PayrollRun, RunStatus};
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        AppState::new(repository(definition(vec![
            employee("emp_001", "25000.00"),
            employee("emp_002", "10000.00"),
        ])))
    }

    fn execute_body(month: u32) -> String {
        serde_json::to_string(&ExecutePayrollRequest {
            period_start: chrono::NaiveDate::from_ymd_opt(2025, month, 1).unwrap(),
            period_end: chrono::NaiveDate::from_ymd_opt(2025, month, 28).unwrap(),
            calculation_date: None,
            user: Some("tester".to_string()),
            background: false,
        })
        .unwrap()
    }

    async fn send(router: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_execute_inline_returns_summary() {
        let state = create_test_state();
        let router = create_router(state.clone());

        let (status, body) = send(router, "POST", "/payrolls/PLN-1/execute", &execute_body(1)).await;
        assert_eq!(status, StatusCode::OK);
        let summary: RunSummary = serde_json::from_slice(&body).unwrap();
        assert_eq!(summary.status, RunStatus::Generated);
        assert_eq!(summary.totals.employee_count, 2);
        assert!(summary.errors.is_empty());

        let progress = state.runner().progress().get(summary.run_id).unwrap();
        assert_eq!(progress.processed, 2);
    }

    #[tokio::test]
    async fn test_execute_unknown_definition_is_404() {
        let router = create_router(create_test_state());
        let (status, body) = send(router, "POST", "/payrolls/NOPE/execute", &execute_body(1)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_execute_malformed_json_returns_400() {
        let router = create_router(create_test_state());
        let (status, body) = send(router, "POST", "/payrolls/PLN-1/execute", "{invalid json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "MALFORMED_JSON");
    }

    #[tokio::test]
    async fn test_background_without_worker_is_rejected() {
        let router = create_router(create_test_state());
        let body = r#"{"period_start": "2025-01-01", "period_end": "2025-01-31", "background": true}"#;
        let (status, _) = send(router, "POST", "/payrolls/PLN-1/execute", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_run_and_approve() {
        let state = create_test_state();
        let (_, body) = send(create_router(state.clone()), "POST", "/payrolls/PLN-1/execute", &execute_body(2)).await;
        let summary: RunSummary = serde_json::from_slice(&body).unwrap();
        let uri = format!("/runs/{}", summary.run_id);

        let (status, body) = send(create_router(state.clone()), "GET", &uri, "").await;
        assert_eq!(status, StatusCode::OK);
        let run: PayrollRun = serde_json::from_slice(&body).unwrap();
        assert_eq!(run.results.len(), 2);

        let (status, body) = send(
            create_router(state.clone()),
            "POST",
            &format!("{}/approve", uri),
            r#"{"user": "supervisor"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let approved: RunSummary = serde_json::from_slice(&body).unwrap();
        assert_eq!(approved.status, RunStatus::Approved);

        let (status, body) = send(create_router(state), "POST", &format!("{}/approve", uri), "{}").await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_progress_and_invalid_ids() {
        let state = create_test_state();
        let (_, body) = send(create_router(state.clone()), "POST", "/payrolls/PLN-1/execute", &execute_body(3)).await;
        let summary: RunSummary = serde_json::from_slice(&body).unwrap();

        let (status, body) =
            send(create_router(state.clone()), "GET", &format!("/runs/{}/progress", summary.run_id), "").await;
        assert_eq!(status, StatusCode::OK);
        let progress: JobProgress = serde_json::from_slice(&body).unwrap();
        assert_eq!(progress.total, 2);

        let (status, _) = send(create_router(state.clone()), "GET", "/runs/not-a-uuid", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(create_router(state), "GET", &format!("/runs/{}/progress", Uuid::new_v4()), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_retry_of_generated_run_is_rejected() {
        let state = create_test_state();
        let (_, body) = send(create_router(state.clone()), "POST", "/payrolls/PLN-1/execute", &execute_body(4)).await;
        let summary: RunSummary = serde_json::from_slice(&body).unwrap();

        let (status, body) =
            send(create_router(state), "POST", &format!("/runs/{}/retry", summary.run_id), "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
    }
}
