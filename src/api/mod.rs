//! HTTP API module for the payroll engine.
//!
//! This module provides the REST endpoints for executing payroll runs,
//! polling their progress and driving their lifecycle.

mod handlers;
mod request;
mod response;
mod state;

pub use handlers::create_router;
pub use request::{ExecutePayrollRequest, RunActionRequest};
pub use response::{ApiError, ApiErrorResponse, RetryResponse, RunSummary};
pub use state::AppState;
