//! Progress records for background runs.
//!
//! The store lives apart from the payroll repository so observers can poll
//! progress while a batch holds the repository.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ProgressUpdate;
use crate::models::LogEntry;

/// State of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for a worker.
    Queued,
    /// Being processed.
    Running,
    /// Finished; the run may still contain employee errors.
    Completed,
    /// The batch was rolled back.
    Failed,
}

/// Progress of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// The run.
    pub run_id: Uuid,
    /// The job processing it.
    pub job_id: Option<Uuid>,
    /// Job state.
    pub state: JobState,
    /// Employees handled so far.
    pub processed: usize,
    /// Employees in the run.
    pub total: usize,
    /// Employees that failed so far.
    pub errors: usize,
    /// The employee handled last.
    pub current_employee: Option<String>,
    /// Latest log entries.
    pub log_tail: Vec<LogEntry>,
    /// Processing attempts, retries included.
    pub attempts: u32,
    /// Last failure message.
    pub last_error: Option<String>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

/// Shared, independently locked progress records.
#[derive(Debug, Clone, Default)]
pub struct ProgressStore {
    records: Arc<Mutex<HashMap<Uuid, JobProgress>>>,
}

impl ProgressStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a queued job, resetting any previous counters.
    pub fn queue(&self, run_id: Uuid, job_id: Uuid, total: usize) {
        self.with_records(|records| {
            let attempts = records.get(&run_id).map_or(0, |p| p.attempts);
            records.insert(
                run_id,
                JobProgress {
                    run_id,
                    job_id: Some(job_id),
                    state: JobState::Queued,
                    processed: 0,
                    total,
                    errors: 0,
                    current_employee: None,
                    log_tail: Vec::new(),
                    attempts,
                    last_error: None,
                    updated_at: Utc::now(),
                },
            );
        });
    }

    /// Marks a job as running and counts the attempt.
    pub fn start(&self, run_id: Uuid) {
        self.modify(run_id, |p| {
            p.state = JobState::Running;
            p.attempts += 1;
        });
    }

    /// Records a progress flush.
    pub fn update(&self, run_id: Uuid, update: &ProgressUpdate) {
        self.modify(run_id, |p| {
            p.processed = update.processed;
            p.total = update.total;
            p.errors = update.errors;
            p.current_employee = update.current_employee.clone();
            p.log_tail = update.log_tail.clone();
        });
    }

    /// Records the end of an attempt.
    pub fn finish(&self, run_id: Uuid, state: JobState, error: Option<String>) {
        self.modify(run_id, |p| {
            p.state = state;
            p.last_error = error;
            if state != JobState::Queued {
                p.job_id = None;
            }
        });
    }

    /// Current progress of a run.
    pub fn get(&self, run_id: Uuid) -> Option<JobProgress> {
        self.with_records(|records| records.get(&run_id).cloned())
    }

    fn modify<F: FnOnce(&mut JobProgress)>(&self, run_id: Uuid, change: F) {
        self.with_records(|records| {
            if let Some(progress) = records.get_mut(&run_id) {
                change(progress);
                progress.updated_at = Utc::now();
            }
        });
    }

    fn with_records<T, F: FnOnce(&mut HashMap<Uuid, JobProgress>) -> T>(&self, f: F) -> T {
        // Poisoned records are still plain counters.
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_lifecycle() {
        let store = ProgressStore::new();
        let run_id = Uuid::new_v4();
        let job_id = Uuid::new_v4();
        store.queue(run_id, job_id, 25);
        store.start(run_id);
        store.update(
            run_id,
            &ProgressUpdate {
                processed: 10,
                total: 25,
                errors: 1,
                current_employee: Some("emp_010".to_string()),
                log_tail: vec![],
            },
        );

        let progress = store.get(run_id).unwrap();
        assert_eq!(progress.state, JobState::Running);
        assert_eq!(progress.processed, 10);
        assert_eq!(progress.errors, 1);
        assert_eq!(progress.job_id, Some(job_id));

        store.finish(run_id, JobState::Completed, None);
        let progress = store.get(run_id).unwrap();
        assert_eq!(progress.state, JobState::Completed);
        assert_eq!(progress.job_id, None);
    }

    #[test]
    fn test_requeue_resets_counters_but_keeps_attempts() {
        let store = ProgressStore::new();
        let run_id = Uuid::new_v4();
        store.queue(run_id, Uuid::new_v4(), 5);
        store.start(run_id);
        store.finish(run_id, JobState::Failed, Some("timeout".to_string()));

        store.queue(run_id, Uuid::new_v4(), 5);
        let progress = store.get(run_id).unwrap();
        assert_eq!(progress.state, JobState::Queued);
        assert_eq!(progress.attempts, 1);
        assert_eq!(progress.last_error, None);
    }

    #[test]
    fn test_unknown_run_is_none() {
        assert!(ProgressStore::new().get(Uuid::new_v4()).is_none());
    }
}
