//! Inventory record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Dir,
    File,
}

/// One inventoried filesystem entry.
///
/// `full_path` is always `root_path` joined with a relative component chain;
/// a record never crosses root boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub kind: RecordKind,
    pub root_path: String,
    pub full_path: String,
    pub name: String,
}

/// Produced once per scan, immutable after creation.
#[derive(Debug, Clone)]
pub struct ScanRun {
    pub timestamp: DateTime<Utc>,
    pub output_file: PathBuf,
    pub record_count: usize,
}
