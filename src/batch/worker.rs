//! Tokio worker draining the job queue.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::retry::RetryPolicy;
use super::runner::{BatchRunner, Job};
use crate::engine::PayrollRepository;
use crate::error::{EngineError, EngineResult};

/// Processes queued jobs one at a time, retrying recoverable failures.
pub struct BatchWorker {
    sender: mpsc::UnboundedSender<Job>,
    handle: JoinHandle<()>,
}

impl BatchWorker {
    /// Spawns the worker task on the current runtime.
    pub fn spawn<R>(runner: BatchRunner<R>, policy: RetryPolicy) -> Self
    where
        R: PayrollRepository + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let handle = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                run_with_retries(&runner, job, policy).await;
            }
            debug!("batch worker stopped");
        });
        Self { sender, handle }
    }

    /// Queues a submitted job.
    ///
    /// # Errors
    ///
    /// Fails when the worker has stopped.
    pub fn enqueue(&self, job: Job) -> EngineResult<()> {
        self.sender
            .send(job)
            .map_err(|_| EngineError::transient("batch worker is not running"))
    }

    /// Stops accepting jobs and waits for the queue to drain.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(err) = self.handle.await {
            error!(error = %err, "batch worker terminated abnormally");
        }
    }
}

async fn run_with_retries<R>(runner: &BatchRunner<R>, mut job: Job, policy: RetryPolicy)
where
    R: PayrollRepository + 'static,
{
    let mut attempt = 0;
    loop {
        let worker = runner.clone();
        let err = match tokio::task::spawn_blocking(move || worker.process(job)).await {
            Ok(Ok(run)) => {
                info!(run_id = %run.id, attempt, "job finished");
                return;
            }
            Ok(Err(err)) => err,
            Err(join) => {
                error!(run_id = %job.run_id, error = %join, "job panicked");
                if let Err(err) = runner.abandon(job, &format!("job panicked: {}", join)) {
                    error!(run_id = %job.run_id, error = %err, "could not release abandoned job");
                }
                return;
            }
        };

        if !policy.should_retry(err.is_recoverable(), attempt) {
            warn!(run_id = %job.run_id, attempt, error = %err, "job failed; not retrying");
            return;
        }
        let delay = policy.delay(attempt);
        warn!(run_id = %job.run_id, attempt, ?delay, error = %err, "job failed; retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;

        job = match runner.retry(job.run_id, None) {
            Ok(next) => next,
            Err(err) => {
                error!(run_id = %job.run_id, error = %err, "could not requeue job");
                return;
            }
        };
    }
}
