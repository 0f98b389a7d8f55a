use thiserror::Error;

use maturity_core::CoreError;
use maturity_storage::StorageError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("access to sync folder {folder} lost: {reason}")]
    PermissionLost { folder: String, reason: String },

    #[error("folder sync is not enabled")]
    SyncDisabled,

    #[error("no assessment is open")]
    NoCurrentAssessment,

    #[error("assessment has no name yet")]
    UnnamedAssessment,

    #[error("assessment not found: {key}")]
    NotFound { key: String },

    #[error("invalid backup: {0}")]
    InvalidBackup(String),
}
