//! Background execution: job locks, progress tracking and retries.

mod lock;
mod progress;
mod retry;
mod runner;
mod worker;

pub use lock::JobLocks;
pub use progress::{JobProgress, JobState, ProgressStore};
pub use retry::RetryPolicy;
pub use runner::{BatchRunner, Job};
pub use worker::BatchWorker;
