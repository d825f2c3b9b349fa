//! Background run submission, processing and retry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::lock::JobLocks;
use super::progress::{JobState, ProgressStore};
use crate::engine::{ExecutionRequest, PayrollEngine, PayrollRepository, ProgressUpdate};
use crate::error::{EngineError, EngineResult};
use crate::models::{LogLevel, PayrollRun, RunStatus};

/// A unit of background work: one run, locked by one job token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// The run to process.
    pub run_id: Uuid,
    /// The lock token.
    pub job_id: Uuid,
}

/// Runs payrolls in the background against a shared repository.
///
/// Progress is written to a [`ProgressStore`] that does not share the
/// repository lock, so it can be polled while a batch is running.
pub struct BatchRunner<R> {
    repo: Arc<Mutex<R>>,
    progress: ProgressStore,
    locks: JobLocks,
}

impl<R> Clone for BatchRunner<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            progress: self.progress.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<R: PayrollRepository> BatchRunner<R> {
    /// Creates a runner over a shared repository.
    pub fn new(repo: Arc<Mutex<R>>) -> Self {
        Self {
            repo,
            progress: ProgressStore::new(),
            locks: JobLocks::new(),
        }
    }

    /// The shared repository.
    pub fn repository(&self) -> &Arc<Mutex<R>> {
        &self.repo
    }

    /// The progress store.
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// The job lock table.
    pub fn locks(&self) -> &JobLocks {
        &self.locks
    }

    /// Validates the request, creates the run and locks it for a new job.
    pub fn submit(&self, request: &ExecutionRequest) -> Result<Job, Vec<EngineError>> {
        let mut repo = self.lock_repo().map_err(|e| vec![e])?;
        let (mut run, definition) = PayrollEngine::new(&mut *repo).prepare(request)?;

        let job_id = self.locks.acquire(run.id).map_err(|e| vec![e])?;
        run.job_id = Some(job_id);
        run.log(LogLevel::Info, None, format!("queued as job {}", job_id));
        repo.save_run(&run).map_err(|e| vec![e])?;
        self.progress.queue(run.id, job_id, definition.employees.len());

        info!(run_id = %run.id, job_id = %job_id, "payroll run queued");
        Ok(Job {
            run_id: run.id,
            job_id,
        })
    }

    /// Processes a submitted job to completion and releases its lock.
    ///
    /// # Errors
    ///
    /// Returns the batch-level failure; the run is then in `Error`.
    pub fn process(&self, job: Job) -> EngineResult<PayrollRun> {
        if self.locks.holder(job.run_id) != Some(job.job_id) {
            return Err(EngineError::LockHeld {
                run_id: job.run_id.to_string(),
            });
        }
        self.progress.start(job.run_id);
        let result = self.process_locked(job);
        self.locks.release(job.run_id, job.job_id);

        match &result {
            Ok(run) => {
                self.progress.finish(job.run_id, JobState::Completed, None);
                info!(run_id = %run.id, status = %run.status, "background run completed");
            }
            Err(err) => {
                self.progress.finish(job.run_id, JobState::Failed, Some(err.to_string()));
                warn!(run_id = %job.run_id, error = %err, "background run failed");
            }
        }
        result
    }

    /// Resets a failed run and locks it for a fresh attempt.
    ///
    /// # Errors
    ///
    /// The run must be in `Error` and its lock must be free.
    pub fn retry(&self, run_id: Uuid, user: Option<&str>) -> EngineResult<Job> {
        let mut repo = self.lock_repo()?;
        let run = repo.get_run(run_id)?;
        if run.status != RunStatus::Error {
            return Err(EngineError::validation(format!(
                "run {} is {}; only failed runs can be retried",
                run_id, run.status
            )));
        }
        if self.locks.holder(run_id).is_some() {
            return Err(EngineError::LockHeld {
                run_id: run_id.to_string(),
            });
        }

        let mut run = PayrollEngine::new(&mut *repo).reset_for_retry(run_id, user)?;
        let job_id = self.locks.acquire(run_id)?;
        run.job_id = Some(job_id);
        repo.save_run(&run)?;

        let total = repo
            .get_payroll_definition(&run.definition_id)
            .map(|d| d.employees.len())
            .unwrap_or_default();
        self.progress.queue(run_id, job_id, total);
        info!(run_id = %run_id, job_id = %job_id, "payroll run requeued");
        Ok(Job { run_id, job_id })
    }

    /// Fails a job whose processing aborted without returning.
    ///
    /// Releases the job lock and moves a still-calculating run to `Error`,
    /// marked unrecoverable, so it can only be retried by hand. A repository
    /// lock poisoned by the abort is recovered.
    pub fn abandon(&self, job: Job, reason: &str) -> EngineResult<()> {
        self.locks.release(job.run_id, job.job_id);
        self.progress.finish(job.run_id, JobState::Failed, Some(reason.to_string()));

        let mut repo = self.repo.lock().unwrap_or_else(PoisonError::into_inner);
        self.repo.clear_poison();
        let mut run = repo.get_run(job.run_id)?;
        if run.status == RunStatus::Calculating {
            run.error_recoverable = Some(false);
            run.log(LogLevel::Error, None, format!("run aborted: {}", reason));
            run.transition(RunStatus::Error, None, Some(reason))?;
        }
        if run.job_id == Some(job.job_id) {
            run.job_id = None;
        }
        repo.save_run(&run)?;

        warn!(run_id = %job.run_id, job_id = %job.job_id, reason, "background run abandoned");
        Ok(())
    }

    fn process_locked(&self, job: Job) -> EngineResult<PayrollRun> {
        let mut repo = self.lock_repo()?;
        let mut run = repo.get_run(job.run_id)?;
        if run.status != RunStatus::Calculating {
            return Err(EngineError::validation(format!(
                "run {} is {}; only calculating runs can be processed",
                run.id, run.status
            )));
        }

        let definition = match repo.get_payroll_definition(&run.definition_id) {
            Ok(definition) => definition,
            Err(err) => {
                run.error_recoverable = Some(err.is_recoverable());
                run.log(LogLevel::Error, None, format!("run failed: {}", err));
                run.transition(RunStatus::Error, None, Some(&err.to_string()))?;
                run.job_id = None;
                repo.save_run(&run)?;
                return Err(err);
            }
        };

        let progress = self.progress.clone();
        let run_id = run.id;
        let mut flush = |update: &ProgressUpdate| progress.update(run_id, update);
        let outcome = PayrollEngine::new(&mut *repo).process(&mut run, &definition, &mut flush);
        run.job_id = None;
        repo.save_run(&run)?;
        outcome.map(|()| run)
    }

    fn lock_repo(&self) -> EngineResult<MutexGuard<'_, R>> {
        self.repo
            .lock()
            .map_err(|_| EngineError::transient("repository lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InMemoryRepository;
    use crate::engine::test_support::{definition, employee, repository, request};

    fn runner() -> BatchRunner<InMemoryRepository> {
        let repo = repository(definition(vec![
            employee("emp_001", "25000.00"),
            employee("emp_002", "0"),
            employee("emp_003", "10000.00"),
        ]));
        BatchRunner::new(Arc::new(Mutex::new(repo)))
    }

    #[test]
    fn test_submit_then_process() {
        let runner = runner();
        let job = runner.submit(&request(1)).unwrap();

        let queued = runner.progress().get(job.run_id).unwrap();
        assert_eq!(queued.state, JobState::Queued);
        assert_eq!(queued.total, 3);
        assert_eq!(runner.locks().holder(job.run_id), Some(job.job_id));

        let run = runner.process(job).unwrap();
        assert_eq!(run.status, RunStatus::GeneratedWithErrors);
        assert_eq!(run.job_id, None);

        let done = runner.progress().get(job.run_id).unwrap();
        assert_eq!(done.state, JobState::Completed);
        assert_eq!(done.processed, 3);
        assert_eq!(done.errors, 1);
        assert_eq!(runner.locks().holder(job.run_id), None);
    }

    #[test]
    fn test_process_requires_lock_token() {
        let runner = runner();
        let job = runner.submit(&request(1)).unwrap();
        let forged = Job {
            run_id: job.run_id,
            job_id: Uuid::new_v4(),
        };
        assert!(matches!(runner.process(forged), Err(EngineError::LockHeld { .. })));
    }

    #[test]
    fn test_retry_requires_error_state() {
        let runner = runner();
        let job = runner.submit(&request(1)).unwrap();
        runner.process(job).unwrap();
        let err = runner.retry(job.run_id, None).unwrap_err();
        assert!(err.to_string().contains("only failed runs"));
    }

    #[test]
    fn test_retry_reprocesses_failed_run() {
        let runner = runner();
        let job = runner.submit(&request(1)).unwrap();
        {
            let mut repo = runner.repository().lock().unwrap();
            let mut run = repo.get_run(job.run_id).unwrap();
            run.transition(RunStatus::Error, None, Some("timeout")).unwrap();
            run.error_recoverable = Some(true);
            repo.save_run(&run).unwrap();
        }
        assert!(matches!(runner.retry(job.run_id, None), Err(EngineError::LockHeld { .. })));
        runner.locks().release(job.run_id, job.job_id);

        let retry = runner.retry(job.run_id, Some("operator")).unwrap();
        assert_ne!(retry.job_id, job.job_id);
        let run = runner.process(retry).unwrap();
        assert_eq!(run.status, RunStatus::GeneratedWithErrors);
        assert_eq!(run.results.len(), 2);
        assert_eq!(runner.progress().get(job.run_id).unwrap().attempts, 1);
    }

    #[test]
    fn test_abandoned_job_is_released_and_retryable() {
        let runner = runner();
        let job = runner.submit(&request(1)).unwrap();
        let repo = Arc::clone(runner.repository());
        let crashed = std::thread::spawn(move || {
            let _guard = repo.lock().unwrap();
            panic!("calculation crashed");
        })
        .join();
        assert!(crashed.is_err());
        assert!(runner.repository().is_poisoned());

        runner.abandon(job, "job panicked").unwrap();

        assert!(!runner.repository().is_poisoned());
        assert_eq!(runner.locks().holder(job.run_id), None);
        assert_eq!(runner.progress().get(job.run_id).unwrap().state, JobState::Failed);
        let run = runner.repository().lock().unwrap().get_run(job.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.error_recoverable, Some(false));
        assert_eq!(run.job_id, None);

        let retry = runner.retry(job.run_id, Some("operator")).unwrap();
        assert_eq!(runner.process(retry).unwrap().status, RunStatus::GeneratedWithErrors);
    }

    #[test]
    fn test_vanished_definition_marks_run_error() {
        let runner = runner();
        let job = runner.submit(&request(1)).unwrap();
        {
            let mut repo = runner.repository().lock().unwrap();
            let mut run = repo.get_run(job.run_id).unwrap();
            run.definition_id = "MISSING".to_string();
            repo.save_run(&run).unwrap();
        }
        let err = runner.process(job).unwrap_err();
        assert!(!err.is_recoverable());
        let run = runner.repository().lock().unwrap().get_run(job.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.error_recoverable, Some(false));
    }
}
