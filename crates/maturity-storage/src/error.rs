use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {key}")]
    NotFound { key: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("folder unavailable: {path}")]
    FolderUnavailable { path: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Classify an I/O failure on `path`.
    pub fn from_io(source: io::Error, path: &Path) -> Self {
        let path = path.display().to_string();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::NotFound => Self::NotFound { key: path },
            _ => Self::Io { path, source },
        }
    }

    /// True when access to the folder itself is gone and sync must stop.
    pub fn is_access_lost(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::FolderUnavailable { .. }
        )
    }
}
