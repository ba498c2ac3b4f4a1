use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use log::debug;

use super::store::{SecretStore, SecretStoreError};

/// Process-local secret store. Nothing survives the invocation; used for dry
/// runs and tests.
#[derive(Clone, Default)]
pub struct MemorySecretStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .lock()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl SecretStore for MemorySecretStore {
    fn store(&self, key: &str, value: &str) -> Result<(), SecretStoreError> {
        let mut lock = self
            .inner
            .lock()
            .map_err(|err| SecretStoreError::Store(format!("memory store poisoned: {err}")))?;
        lock.insert(key.to_string(), value.to_string());
        debug!("[{key}] memory-store: private key kept in memory");
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<String, SecretStoreError> {
        let lock = self
            .inner
            .lock()
            .map_err(|err| SecretStoreError::Store(format!("memory store poisoned: {err}")))?;
        lock.get(key)
            .cloned()
            .ok_or_else(|| SecretStoreError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_and_overwrite() {
        let store = MemorySecretStore::new();
        store.store("a.example.com", "one").unwrap();
        assert_eq!(store.retrieve("a.example.com").unwrap(), "one");
        store.store("a.example.com", "two").unwrap();
        assert_eq!(store.retrieve("a.example.com").unwrap(), "two");
        assert_eq!(store.keys(), vec!["a.example.com"]);
    }

    #[test]
    fn clones_share_state() {
        let store = MemorySecretStore::new();
        let clone = store.clone();
        store.store("k", "v").unwrap();
        assert_eq!(clone.retrieve("k").unwrap(), "v");
    }
}
