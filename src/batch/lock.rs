//! Exclusive per-run job locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Advisory locks keyed by run, each held by a job token.
#[derive(Debug, Clone, Default)]
pub struct JobLocks {
    held: Arc<Mutex<HashMap<Uuid, Uuid>>>,
}

impl JobLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for `run_id`, returning the new job token.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LockHeld`] when another job holds it.
    pub fn acquire(&self, run_id: Uuid) -> EngineResult<Uuid> {
        let mut held = self.held.lock().map_err(|_| EngineError::transient("job lock table poisoned"))?;
        if held.contains_key(&run_id) {
            return Err(EngineError::LockHeld {
                run_id: run_id.to_string(),
            });
        }
        let job_id = Uuid::new_v4();
        held.insert(run_id, job_id);
        Ok(job_id)
    }

    /// Releases the lock if `job_id` holds it. Returns true when released.
    pub fn release(&self, run_id: Uuid, job_id: Uuid) -> bool {
        let Ok(mut held) = self.held.lock() else {
            return false;
        };
        if held.get(&run_id) == Some(&job_id) {
            held.remove(&run_id);
            true
        } else {
            false
        }
    }

    /// The job holding the lock for `run_id`.
    pub fn holder(&self, run_id: Uuid) -> Option<Uuid> {
        self.held.lock().ok().and_then(|held| held.get(&run_id).copied())
    }
}
