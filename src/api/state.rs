//! Application state for the payroll API.
//!
//! This module defines the shared application state that is available
//! to all request handlers.

use std::sync::{Arc, Mutex};

use crate::batch::{BatchRunner, BatchWorker, RetryPolicy};
use crate::config::ConfigLoader;
use crate::engine::InMemoryRepository;

/// Shared application state.
///
/// Holds the batch runner over the shared repository and, when background
/// execution is enabled, the worker that drains queued jobs.
#[derive(Clone)]
pub struct AppState {
    runner: BatchRunner<InMemoryRepository>,
    worker: Option<Arc<BatchWorker>>,
}

impl AppState {
    /// Creates a state with inline execution only.
    pub fn new(repo: InMemoryRepository) -> Self {
        Self {
            runner: BatchRunner::new(Arc::new(Mutex::new(repo))),
            worker: None,
        }
    }

    /// Builds the repository from loaded configuration and seed data.
    pub fn from_config(mut config: ConfigLoader) -> Self {
        let seed = config.take_seed().unwrap_or_default();
        Self::new(InMemoryRepository::from_seed(config.settings().clone(), seed))
    }

    /// Spawns a background worker. Must be called inside a tokio runtime.
    pub fn with_worker(mut self, policy: RetryPolicy) -> Self {
        self.worker = Some(Arc::new(BatchWorker::spawn(self.runner.clone(), policy)));
        self
    }

    /// Returns the batch runner.
    pub fn runner(&self) -> &BatchRunner<InMemoryRepository> {
        &self.runner
    }

    /// Returns the background worker, if enabled.
    pub fn worker(&self) -> Option<&BatchWorker> {
        self.worker.as_deref()
    }
}
