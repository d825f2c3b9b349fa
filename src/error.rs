//! Error types for the payroll engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur while computing and executing
//! payroll runs.

use thiserror::Error;

/// The main error type for the payroll engine.
///
/// The variants double as the engine's error taxonomy: validation and
/// calculation errors are never retried automatically, formula errors are
/// absorbed at the concept boundary, and transient errors are eligible for
/// automatic retry.
///
/// # Example
///
/// ```
/// use payroll_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/calculation.yaml".to_string(),
/// };
/// assert_eq!(
///     error.to_string(),
///     "Configuration file not found: /missing/calculation.yaml"
/// );
/// assert!(!error.is_recoverable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The payroll definition or an employee is not eligible for processing.
    #[error("Validation error: {message}")]
    Validation {
        /// A description of the failed validation.
        message: String,
    },

    /// Required reference data is missing (e.g. an exchange rate).
    #[error("Calculation error: {message}")]
    Calculation {
        /// A description of the calculation error.
        message: String,
    },

    /// A formula schema is malformed or an input it needs is missing.
    #[error("Formula evaluation error: {message}")]
    FormulaEvaluation {
        /// A description of the evaluation failure.
        message: String,
    },

    /// A transient infrastructure failure (connectivity, timeout, lock contention).
    #[error("Transient error: {message}")]
    Transient {
        /// A description of the infrastructure failure.
        message: String,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity that was looked up.
        entity: String,
        /// The identifier that was not found.
        id: String,
    },

    /// A state machine transition that is not allowed.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// The current state.
        from: String,
        /// The requested state.
        to: String,
    },

    /// Another worker holds the processing lock for a run.
    #[error("Run {run_id} is locked by another job")]
    LockHeld {
        /// The run whose lock is held.
        run_id: String,
    },

    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },
}

impl EngineError {
    /// Builds a [`EngineError::Validation`] from any message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Builds a [`EngineError::Calculation`] from any message.
    pub fn calculation(message: impl Into<String>) -> Self {
        Self::Calculation {
            message: message.into(),
        }
    }

    /// Builds a [`EngineError::FormulaEvaluation`] from any message.
    pub fn formula(message: impl Into<String>) -> Self {
        Self::FormulaEvaluation {
            message: message.into(),
        }
    }

    /// Builds a [`EngineError::Transient`] from any message.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Builds a [`EngineError::NotFound`] for the given entity kind and id.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Returns true when retry tooling may resubmit the failed work automatically.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::LockHeld { .. })
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
