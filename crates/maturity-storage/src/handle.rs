use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StorageError;
use crate::folder::{DirectoryFolder, SyncFolder};

/// Persistable reference to the sync folder.
///
/// The handle alone grants nothing: every session calls [`Self::open`] to
/// re-check access before any file is touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFolderHandle {
    pub path: PathBuf,
}

impl SyncFolderHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Re-acquire access to the folder.
    pub async fn open(&self) -> Result<Arc<dyn SyncFolder>, StorageError> {
        let folder = DirectoryFolder::new(&self.path);
        folder.request_permission().await?;
        info!(path = %self.path.display(), "sync folder access granted");
        Ok(Arc::new(folder))
    }
}
