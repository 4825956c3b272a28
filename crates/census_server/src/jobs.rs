//! In-memory job tracking.
//!
//! Jobs live for the process lifetime only; there is no durable queue and
//! records are lost on restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error)
    }
}

/// One tracked execution of a named action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub action: String,
    pub status: JobStatus,
    /// Failure message captured verbatim; empty unless status is `error`.
    pub error: String,
    pub updated_at: DateTime<Utc>,
}

/// Process-lifetime job map.
///
/// The executor is the only writer. Readers get copies of the record, never
/// references into the map.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh opaque job identifier.
    pub fn new_job_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Upsert the record for `job_id` and return a copy of what is stored.
    /// Terminal states are final: an update against a completed job is
    /// ignored and the stored record returned unchanged.
    pub fn record(
        &self,
        job_id: &str,
        action: &str,
        status: JobStatus,
        error: impl Into<String>,
    ) -> Job {
        let job = Job {
            id: job_id.to_string(),
            action: action.to_string(),
            status,
            error: error.into(),
            updated_at: Utc::now(),
        };

        let mut jobs = self.lock();
        match jobs.get(job_id) {
            Some(existing) if existing.status.is_terminal() => existing.clone(),
            _ => {
                jobs.insert(job_id.to_string(), job.clone());
                job
            }
        }
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.lock().get(job_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Job>> {
        // A poisoning panic while holding the lock leaves the map intact;
        // keep serving the records we have.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
