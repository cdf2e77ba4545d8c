//! Browser LocalStorage backend

use crate::persistence::{KeyValueStore, StorageError};

/// `window.localStorage`, looked up on every call so a store created before
/// storage becomes available still works later
#[derive(Debug, Clone, Copy, Default)]
pub struct WebStore;

impl WebStore {
    fn storage() -> Result<web_sys::Storage, StorageError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or(StorageError::Unavailable)
    }
}

impl KeyValueStore for WebStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| StorageError::Backend {
                key: key.to_string(),
                reason: format!("{e:?}"),
            })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| StorageError::Backend {
                key: key.to_string(),
                reason: format!("{e:?}"),
            })
    }
}
