//! Sync error types
//!
//! Every failure in the sync layer comes back as a `SyncError`; callers
//! that only need a coarse answer look at `kind()`.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cache::Category;
use crate::store::StoreError;

/// Coarse failure classes reported to the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Missing or unusable configuration, e.g. no credentials
    Config,
    /// Rejected before any I/O
    InvalidInput,
    /// The remote store call failed
    Transport,
    /// Local disk read or write failed
    Filesystem,
}

/// Sync layer error types
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Unsupported category: {0}")]
    UnsupportedCategory(String),

    #[error("Invalid remote key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("File type of '{file_name}' is not accepted for {category}")]
    RejectedFileType { file_name: String, category: Category },

    #[error("Local file not found: {}", .0.display())]
    MissingLocalFile(PathBuf),

    #[error("Transfer of '{key}' failed: {source}")]
    Transport {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::UnsupportedCategory(_)
            | SyncError::InvalidKey { .. }
            | SyncError::InvalidFileName(_)
            | SyncError::RejectedFileType { .. }
            | SyncError::MissingLocalFile(_) => ErrorKind::InvalidInput,
            SyncError::Transport { source, .. } if source.is_config() => ErrorKind::Config,
            SyncError::Transport { .. } => ErrorKind::Transport,
            SyncError::Filesystem { .. } => ErrorKind::Filesystem,
        }
    }
}
