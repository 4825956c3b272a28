use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    /// A configured root does not exist. Whether this aborts the run is the
    /// caller's policy (`scan.ignore_missing_path`).
    #[error("scan root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    /// Failed to produce an output file. Always aborts the run.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("record serialization failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
