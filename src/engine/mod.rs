//! Payroll run orchestration.
//!
//! This module ties the calculation steps together into runs: the
//! repository contract and its in-memory implementation, run-level
//! validation, the executor and the post-calculation lifecycle.

mod executor;
mod lifecycle;
mod memory;
mod repository;
mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use executor::{ExecutionOutcome, ExecutionRequest, PayrollEngine, ProgressUpdate};
pub use memory::InMemoryRepository;
pub use repository::{PayrollRepository, Savepoint, novelty_quantities};
pub use validation::precheck;
