//! Dated snapshot retention.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;

const SECONDS_PER_DAY: u64 = 86_400;

static DATED_SNAPSHOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^scan_\d{8}_\d{6}\.csv$").expect("valid snapshot pattern"));

/// Deletes expired dated snapshots. The latest file is never a candidate,
/// under any configuration.
pub struct RetentionManager {
    output_dir: PathBuf,
    latest_filename: String,
}

impl RetentionManager {
    pub fn new(output_dir: impl Into<PathBuf>, latest_filename: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            latest_filename: latest_filename.into(),
        }
    }

    /// Delete plain files matching the dated naming convention whose
    /// modification time is strictly before `now - keep_days` days. Returns
    /// the number removed.
    pub fn cleanup(&self, keep_days: u32) -> Result<usize> {
        self.cleanup_at(keep_days, SystemTime::now())
    }

    fn cleanup_at(&self, keep_days: u32, now: SystemTime) -> Result<usize> {
        let cutoff = now
            .checked_sub(Duration::from_secs(u64::from(keep_days) * SECONDS_PER_DAY))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut removed = 0usize;
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == self.latest_filename || !DATED_SNAPSHOT.is_match(&name) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            if metadata.modified()? < cutoff {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        tracing::info!(removed, keep_days, "snapshot retention pass complete");
        Ok(removed)
    }
}
