use serde::{Serialize, de::DeserializeOwned};

use crate::error::StorageError;
use crate::store::PersistentStore;

/// Load a JSON value from the store. `None` when the key is unset.
pub async fn load_state<T: DeserializeOwned>(
    store: &dyn PersistentStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(key).await? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// Save a value to the store as JSON.
pub async fn save_state<T: Serialize>(
    store: &dyn PersistentStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let text = serde_json::to_string(value)?;
    store.set(key, text).await
}
