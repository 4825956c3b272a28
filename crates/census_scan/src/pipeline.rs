//! The full scan pipeline: resolve, walk, sink, retention, upload.

use std::path::PathBuf;
use std::sync::Arc;

use census_config::AppConfig;
use chrono::Local;

use crate::error::{Result, ScanError};
use crate::record::{ScanRecord, ScanRun};
use crate::resolve;
use crate::retention::RetentionManager;
use crate::sink::RecordSink;
use crate::upload::{ObjectStore, UploadOutcome, Uploader};
use crate::walk::TreeScanner;

/// Summary of one snapshot pass.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub run: ScanRun,
    /// Deduplicated roots the run walked.
    pub roots: Vec<PathBuf>,
    /// Configured roots skipped because they were missing.
    pub skipped_roots: Vec<PathBuf>,
    /// Directories skipped because they could not be read.
    pub skipped_dirs: u64,
    /// Snapshots removed by the retention pass; `None` when disabled.
    pub removed_snapshots: Option<usize>,
}

/// Owns the pipeline stages for one configuration.
///
/// `scan_to_disk` and `cleanup` block on filesystem work and belong on a
/// blocking thread; `upload_latest` is async and never fails the caller.
pub struct ScanPipeline {
    config: Arc<AppConfig>,
    sink: RecordSink,
    retention: RetentionManager,
    uploader: Uploader,
}

impl ScanPipeline {
    pub fn new(config: Arc<AppConfig>, store: Option<Arc<dyn ObjectStore>>) -> Self {
        let output = &config.output;
        Self {
            sink: RecordSink::new(&output.directory, &output.latest_filename),
            retention: RetentionManager::new(&output.directory, &output.latest_filename),
            uploader: Uploader::new(config.remote.clone(), &output.directory, store),
            config,
        }
    }

    pub fn latest_path(&self) -> PathBuf {
        self.sink.latest_path()
    }

    /// Resolve roots, walk them and write the dated + latest snapshots.
    ///
    /// A missing root either skips with a warning (`ignore_missing_path`) or
    /// aborts the whole run.
    pub fn scan_to_disk(&self) -> Result<ScanSummary> {
        let started_at = Local::now();
        let roots = resolve::resolve_roots(&self.config.paths);
        tracing::info!(roots = ?roots, "starting scan");

        let scanner = TreeScanner::new(self.config.scan.follow_symlinks);
        let mut records: Vec<ScanRecord> = Vec::new();
        let mut skipped_roots: Vec<PathBuf> = Vec::new();
        let mut skipped_dirs = 0u64;

        for root in &roots {
            match scanner.scan(root) {
                Ok(mut walk) => {
                    records.extend(walk.by_ref());
                    skipped_dirs += walk.skipped_dirs();
                }
                Err(ScanError::MissingRoot(path)) if self.config.scan.ignore_missing_path => {
                    tracing::warn!(path = %path.display(), "scan root missing, skipping");
                    skipped_roots.push(path);
                }
                Err(err) => return Err(err),
            }
        }

        let run = self.sink.write_run(records, started_at)?;
        tracing::info!(
            records = run.record_count,
            output = %run.output_file.display(),
            "scan complete"
        );

        Ok(ScanSummary {
            run,
            roots,
            skipped_roots,
            skipped_dirs,
            removed_snapshots: None,
        })
    }

    /// Retention pass. Returns the number of snapshots removed, or `None`
    /// when retention is disabled.
    pub fn cleanup(&self) -> Result<Option<usize>> {
        match self.config.retention.keep_days() {
            Some(days) => Ok(Some(self.retention.cleanup(days)?)),
            None => {
                tracing::info!("retention disabled, skipping cleanup");
                Ok(None)
            }
        }
    }

    /// Snapshot plus retention, the blocking half of the scan action.
    pub fn scan_and_prune(&self) -> Result<ScanSummary> {
        let mut summary = self.scan_to_disk()?;
        summary.removed_snapshots = self.cleanup()?;
        Ok(summary)
    }

    /// Best-effort push of the latest snapshot to the remote store.
    pub async fn upload_latest(&self) -> UploadOutcome {
        self.uploader.upload_latest(&self.latest_path()).await
    }
}
