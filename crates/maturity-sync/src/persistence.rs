use std::sync::Arc;

use tracing::{debug, warn};

use maturity_core::keys;
use maturity_storage::state::{load_state, save_state};
use maturity_storage::{PersistentStore, SyncFolderHandle};

use crate::error::SyncError;
use crate::repository::AssessmentRepository;

/// The local copy of everything that must survive a restart: the assessment
/// list, the sync toggle and the folder handle.
#[derive(Clone)]
pub struct LocalPersistence {
    store: Arc<dyn PersistentStore>,
}

impl LocalPersistence {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PersistentStore> {
        &self.store
    }

    /// Load the stored assessment list. Missing or unreadable data yields an
    /// empty repository rather than an error.
    pub async fn load_assessments(&self) -> AssessmentRepository {
        match self.store.get(keys::STORE_ASSESSMENTS).await {
            Ok(Some(text)) => AssessmentRepository::from_stored_json(&text),
            Ok(None) => {
                debug!("no stored assessments");
                AssessmentRepository::new()
            }
            Err(e) => {
                warn!(error = %e, "failed to read stored assessments, starting empty");
                AssessmentRepository::new()
            }
        }
    }

    pub async fn save_assessments(&self, repository: &AssessmentRepository) -> Result<(), SyncError> {
        let text = repository.to_json()?;
        self.store.set(keys::STORE_ASSESSMENTS, text).await?;
        debug!(count = repository.len(), "assessments saved locally");
        Ok(())
    }

    pub async fn load_sync_enabled(&self) -> bool {
        match load_state::<bool>(self.store.as_ref(), keys::STORE_SYNC_ENABLED).await {
            Ok(enabled) => enabled.unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "failed to read sync toggle, treating as off");
                false
            }
        }
    }

    pub async fn save_sync_enabled(&self, enabled: bool) -> Result<(), SyncError> {
        save_state(self.store.as_ref(), keys::STORE_SYNC_ENABLED, &enabled).await?;
        Ok(())
    }

    pub async fn load_folder_handle(&self) -> Option<SyncFolderHandle> {
        match load_state(self.store.as_ref(), keys::STORE_SYNC_FOLDER).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "failed to read sync folder handle");
                None
            }
        }
    }

    pub async fn save_folder_handle(&self, handle: &SyncFolderHandle) -> Result<(), SyncError> {
        save_state(self.store.as_ref(), keys::STORE_SYNC_FOLDER, handle).await?;
        Ok(())
    }

    pub async fn clear_folder_handle(&self) -> Result<(), SyncError> {
        self.store.delete(keys::STORE_SYNC_FOLDER).await?;
        Ok(())
    }
}
