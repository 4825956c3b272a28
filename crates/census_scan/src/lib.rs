//! census_scan - the filesystem inventory pipeline.
//!
//! One pass resolves the configured roots to a minimal covering set, walks
//! each root depth-first, writes the records to a dated CSV snapshot plus a
//! canonical latest file, prunes expired snapshots, and opportunistically
//! pushes the latest file to remote object storage.
//!
//! ```text
//! paths ──▶ resolve ──▶ walk ──▶ sink ──▶ retention ──▶ upload
//!           (dedup)     (records) (dated+latest) (prune)  (best effort)
//! ```

pub mod error;
pub mod pipeline;
pub mod record;
pub mod resolve;
pub mod retention;
pub mod sink;
pub mod upload;
pub mod walk;

pub use error::{Result, ScanError};
pub use pipeline::{ScanPipeline, ScanSummary};
pub use record::{RecordKind, ScanRecord, ScanRun};
pub use resolve::resolve_roots;
pub use retention::RetentionManager;
pub use sink::RecordSink;
pub use upload::{
    ObjectStore, S3ObjectStore, UploadOutcome, UploadThrottle, Uploader, UPLOAD_MARKER_NAME,
};
pub use walk::{TreeScanner, Walk};
