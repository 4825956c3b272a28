//! CSV snapshot output.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};

use crate::error::{Result, ScanError};
use crate::record::{ScanRecord, ScanRun};

pub const CSV_HEADER: [&str; 4] = ["kind", "root_path", "full_path", "name"];

/// Writes one run's records to a dated snapshot and refreshes the canonical
/// latest file.
pub struct RecordSink {
    output_dir: PathBuf,
    latest_filename: String,
}

impl RecordSink {
    pub fn new(output_dir: impl Into<PathBuf>, latest_filename: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            latest_filename: latest_filename.into(),
        }
    }

    pub fn latest_path(&self) -> PathBuf {
        self.output_dir.join(&self.latest_filename)
    }

    /// Write all records to a dated file named from the run's start time,
    /// then copy its bytes verbatim over the latest file. After success the
    /// two files are byte-identical. Any write failure aborts the run.
    pub fn write_run<I>(&self, records: I, started_at: DateTime<Local>) -> Result<ScanRun>
    where
        I: IntoIterator<Item = ScanRecord>,
    {
        fs::create_dir_all(&self.output_dir).map_err(|source| ScanError::Write {
            path: self.output_dir.clone(),
            source,
        })?;

        let dated_name = format!("scan_{}.csv", started_at.format("%Y%m%d_%H%M%S"));
        let dated_path = self.output_dir.join(dated_name);

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&dated_path)?;
        writer.write_record(CSV_HEADER)?;

        let mut record_count = 0usize;
        for record in records {
            writer.serialize(&record)?;
            record_count += 1;
        }
        writer.flush().map_err(|source| ScanError::Write {
            path: dated_path.clone(),
            source,
        })?;
        drop(writer);

        let latest_path = self.latest_path();
        fs::copy(&dated_path, &latest_path).map_err(|source| ScanError::Write {
            path: latest_path,
            source,
        })?;

        Ok(ScanRun {
            timestamp: started_at.with_timezone(&Utc),
            output_file: dated_path,
            record_count,
        })
    }
}
