//! Action execution: dispatch, scan serialization and job lifecycle.

use std::sync::Arc;

use anyhow::Context as _;
use serde::Deserialize;
use tokio::task;

use crate::jobs::{Job, JobRegistry, JobStatus};
use crate::AppContext;

/// Actions the executor can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Scan,
    Cleanup,
    UploadLatest,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Scan, Action::Cleanup, Action::UploadLatest];

    pub fn name(self) -> &'static str {
        match self {
            Action::Scan => "scan",
            Action::Cleanup => "cleanup",
            Action::UploadLatest => "upload_latest",
        }
    }

    pub fn parse(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|action| action.name() == name)
    }

    /// Sorted action names for the control surface.
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<_> = Action::ALL.iter().map(|action| action.name()).collect();
        names.sort_unstable();
        names
    }
}

/// How a trigger executes: inline on the caller, or on a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    Sync,
    #[default]
    Async,
}

/// Result of a trigger call.
#[derive(Debug, Clone)]
pub enum Triggered {
    /// Synchronous execution finished; the terminal job record.
    Completed(Job),
    /// Background execution accepted; the job starts out `queued`.
    Queued { id: String },
}

/// Runs actions and drives job-state transitions.
///
/// Every failure is captured on the job record; nothing an action does can
/// escape to the scheduler or the HTTP layer.
#[derive(Clone)]
pub struct ActionExecutor {
    ctx: Arc<AppContext>,
}

impl ActionExecutor {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Trigger `action`. Synchronous mode executes inline and returns the
    /// final record; asynchronous mode records a `queued` job, hands the work
    /// to a bounded background task and returns immediately.
    pub async fn trigger(&self, action: Action, mode: TriggerMode) -> Triggered {
        let job_id = JobRegistry::new_job_id();
        match mode {
            TriggerMode::Sync => Triggered::Completed(self.run_job(action, &job_id).await),
            TriggerMode::Async => {
                self.ctx
                    .registry
                    .record(&job_id, action.name(), JobStatus::Queued, "");
                let executor = self.clone();
                let id = job_id.clone();
                tokio::spawn(async move {
                    let _permit = match executor.ctx.job_slots.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return, // semaphore closed, shutting down
                    };
                    executor.run_job(action, &id).await;
                });
                Triggered::Queued { id: job_id }
            }
        }
    }

    /// Execute one action, recording the running and terminal transitions.
    async fn run_job(&self, action: Action, job_id: &str) -> Job {
        self.ctx
            .registry
            .record(job_id, action.name(), JobStatus::Running, "");
        match self.run_action(action).await {
            Ok(summary) => {
                tracing::info!(job_id, action = action.name(), %summary, "action succeeded");
                self.ctx
                    .registry
                    .record(job_id, action.name(), JobStatus::Success, "")
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::error!(job_id, action = action.name(), error = %message, "action failed");
                self.ctx
                    .registry
                    .record(job_id, action.name(), JobStatus::Error, message)
            }
        }
    }

    async fn run_action(&self, action: Action) -> anyhow::Result<String> {
        match action {
            Action::Scan => self.run_scan().await,
            Action::Cleanup => self.run_cleanup().await,
            Action::UploadLatest => {
                let outcome = self.ctx.pipeline.upload_latest().await;
                Ok(format!("upload {}", outcome.describe()))
            }
        }
    }

    /// The scan pipeline, serialized process-wide: the lock covers snapshot,
    /// retention and the upload attempt.
    async fn run_scan(&self) -> anyhow::Result<String> {
        let _guard = self.ctx.scan_lock.lock().await;

        let pipeline = Arc::clone(&self.ctx.pipeline);
        let summary = task::spawn_blocking(move || pipeline.scan_and_prune())
            .await
            .context("scan task aborted")??;
        let upload = self.ctx.pipeline.upload_latest().await;

        let removed = summary
            .removed_snapshots
            .map(|count| format!(", {count} snapshots removed"))
            .unwrap_or_default();
        Ok(format!(
            "{} records -> {}{removed}, upload {}",
            summary.run.record_count,
            summary.run.output_file.display(),
            upload.describe()
        ))
    }

    async fn run_cleanup(&self) -> anyhow::Result<String> {
        let pipeline = Arc::clone(&self.ctx.pipeline);
        let removed = task::spawn_blocking(move || pipeline.cleanup())
            .await
            .context("cleanup task aborted")??;
        Ok(match removed {
            Some(count) => format!("{count} snapshots removed"),
            None => "retention disabled, nothing to do".to_string(),
        })
    }
}
