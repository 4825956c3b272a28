//! census daemon internals: job tracking, action execution, the HTTP control
//! surface and the periodic scheduler.

pub mod actions;
pub mod api;
pub mod jobs;
pub mod scheduler;

use std::sync::Arc;

use census_config::AppConfig;
use census_scan::{ObjectStore, S3ObjectStore, ScanPipeline};
use tokio::sync::{Mutex, Semaphore};

use crate::jobs::JobRegistry;

pub use actions::{Action, ActionExecutor, TriggerMode, Triggered};
pub use jobs::{Job, JobStatus};

/// Shared application state, constructed once at startup and passed by
/// reference into every handler and background task.
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub registry: JobRegistry,
    pub pipeline: Arc<ScanPipeline>,
    /// Serializes the whole scan pipeline, retention and upload included.
    pub(crate) scan_lock: Mutex<()>,
    /// Bounds concurrently running background actions.
    pub(crate) job_slots: Arc<Semaphore>,
}

impl AppContext {
    /// Build the context, creating the remote store client when enabled.
    pub fn new(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let store: Option<Arc<dyn ObjectStore>> = if config.remote.enabled {
            Some(Arc::new(S3ObjectStore::from_config(&config.remote)?))
        } else {
            None
        };
        Ok(Self::with_store(config, store))
    }

    /// Context with an injected object store, for tests and embedding.
    pub fn with_store(config: AppConfig, store: Option<Arc<dyn ObjectStore>>) -> Arc<Self> {
        let config = Arc::new(config);
        Arc::new(Self {
            pipeline: Arc::new(ScanPipeline::new(Arc::clone(&config), store)),
            registry: JobRegistry::new(),
            scan_lock: Mutex::new(()),
            job_slots: Arc::new(Semaphore::new(config.api.max_concurrent_jobs.max(1))),
            config,
        })
    }
}
