use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::KeyValueStore;
use crate::error::StoreError;

/// In-memory store with an optional byte quota.
///
/// The quota counts key and value bytes across all entries, the way browser
/// storage limits do. A write that would exceed it fails and leaves the
/// previous value in place.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Sorted list of keys currently held.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = match self.lock() {
            Ok(entries) => entries.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        keys.sort();
        keys
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn used_bytes(entries: &HashMap<String, String>, skip: &str) -> usize {
        entries
            .iter()
            .filter(|(k, _)| k.as_str() != skip)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        if let Some(limit) = self.quota_bytes {
            let needed = Self::used_bytes(&entries, key) + key.len() + value.len();
            if needed > limit {
                return Err(StoreError::QuotaExceeded { needed, limit });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("a").unwrap(), None);

        store.set_item("a", "1").unwrap();
        assert_eq!(store.get_item("a").unwrap().as_deref(), Some("1"));

        store.remove_item("a").unwrap();
        assert_eq!(store.get_item("a").unwrap(), None);

        // Removing twice is fine
        store.remove_item("a").unwrap();
    }

    #[test]
    fn test_quota_rejects_and_keeps_previous_value() {
        let store = MemoryStore::with_quota(10);
        store.set_item("k", "short").unwrap();

        let err = store.set_item("k", "much too long value").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { limit: 10, .. }));
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("short"));
    }

    #[test]
    fn test_quota_counts_replacement_once() {
        let store = MemoryStore::with_quota(6);
        store.set_item("k", "abcde").unwrap();
        // Replacing the same key must not count the old value
        store.set_item("k", "vwxyz").unwrap();
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("vwxyz"));
    }

    #[test]
    fn test_keys_sorted() {
        let store = MemoryStore::new();
        store.set_item("b", "").unwrap();
        store.set_item("a", "").unwrap();
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
