//! Fatal error channel for the correlation engine
//!
//! Only structurally invalid input or broken persistence ends up here.
//! Everything recoverable (bad metric columns, records without timestamps,
//! services missing from the topology) is skipped and reported through
//! [`crate::extract::ExtractionDiagnostics`] instead.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RcaError>;

#[derive(Debug, Error)]
pub enum RcaError {
    /// Input that cannot be indexed at all (e.g. a metric sample without a name)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("snapshot checksum mismatch for {path}: expected {expected}, got {actual}")]
    SnapshotChecksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("unsupported snapshot version {0}")]
    SnapshotVersion(u32),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RcaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RcaError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by the caller's input rather than the environment
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RcaError::InvalidInput(_) | RcaError::InvalidConfig(_)
        )
    }
}
