//! Storage error types.
//!
//! The simulation itself never fails; only reading and writing the profile
//! store and settings files can.

use std::fmt;
use std::path::PathBuf;

/// Errors raised by the JSON-backed stores
#[derive(Debug)]
pub enum StoreError {
    /// Reading or writing the file failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but does not hold a valid document.
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Encoding the document failed.
    Serialize(serde_json::Error),

    /// No profile with this ID exists in the store.
    UnknownProfile(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io { path, source } => {
                write!(f, "failed to access '{}': {}", path.display(), source)
            }
            StoreError::Parse { path, source } => {
                write!(f, "corrupt store file '{}': {}", path.display(), source)
            }
            StoreError::Serialize(source) => write!(f, "failed to encode store: {}", source),
            StoreError::UnknownProfile(id) => write!(f, "unknown profile '{}'", id),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            StoreError::Parse { source, .. } => Some(source),
            StoreError::Serialize(source) => Some(source),
            StoreError::UnknownProfile(_) => None,
        }
    }
}

/// Convenience alias: a `Result` using `StoreError` as the error type.
pub type StoreResult<T> = Result<T, StoreError>;
