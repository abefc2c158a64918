//! Resolution store contract and the in-memory engine.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use rewind_core::{ResolvedVersion, StoreError};

/// Lazy sequence of stored entries.
pub type StoreIter<'a> = Box<dyn Iterator<Item = Result<(String, ResolvedVersion), StoreError>> + 'a>;

/// Per-run key/value store holding one [`ResolvedVersion`] per key.
///
/// `update` is the only way the resolution engine writes: the read of the
/// current entry and the write of its replacement happen as one atomic
/// transaction for that key.
pub trait ResolutionStore: Send + Sync {
    /// Read the entry for `key`.
    fn get(&self, key: &str) -> Result<Option<ResolvedVersion>, StoreError>;

    /// Unconditionally write the entry for `key`.
    fn put(&self, key: &str, value: ResolvedVersion) -> Result<(), StoreError>;

    /// Atomically read-modify-write the entry for `key`.
    ///
    /// `decide` receives the current entry and returns the replacement, or
    /// `None` to keep the entry unchanged. It must not call back into the
    /// store. Returns whether a write happened.
    fn update(
        &self,
        key: &str,
        decide: &mut dyn FnMut(Option<&ResolvedVersion>) -> Option<ResolvedVersion>,
    ) -> Result<bool, StoreError>;

    /// Iterate all entries in implementation-defined order.
    ///
    /// Each call starts a fresh pass.
    fn iter(&self) -> StoreIter<'_>;

    /// Number of stored keys.
    fn len(&self) -> usize;

    /// Check if the store holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sharded in-memory store; lives for one run.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, ResolvedVersion>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl ResolutionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<ResolvedVersion>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &str, value: ResolvedVersion) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        decide: &mut dyn FnMut(Option<&ResolvedVersion>) -> Option<ResolvedVersion>,
    ) -> Result<bool, StoreError> {
        // The entry guard holds the shard lock for the whole read-modify-write.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match decide(Some(occupied.get())) {
                Some(replacement) => {
                    occupied.insert(replacement);
                    Ok(true)
                }
                None => Ok(false),
            },
            Entry::Vacant(vacant) => match decide(None) {
                Some(value) => {
                    vacant.insert(value);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    fn iter(&self) -> StoreIter<'_> {
        Box::new(
            self.entries
                .iter()
                .map(|entry| Ok((entry.key().clone(), entry.value().clone()))),
        )
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn resolved(version_id: &str, secs: i64) -> ResolvedVersion {
        ResolvedVersion {
            version_id: version_id.into(),
            last_modified: DateTime::from_timestamp(secs, 0).unwrap(),
            is_latest: false,
            is_delete_marker: false,
        }
    }

    #[test]
    fn test_put_and_get() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert!(store.get("a").unwrap().is_none());

        store.put("a", resolved("v1", 1)).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(resolved("v1", 1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_inserts_replaces_and_keeps() {
        let store = MemoryStore::new();

        let wrote = store
            .update("k", &mut |current| {
                assert!(current.is_none());
                Some(resolved("v1", 1))
            })
            .unwrap();
        assert!(wrote);

        let wrote = store.update("k", &mut |_| None).unwrap();
        assert!(!wrote);
        assert_eq!(store.get("k").unwrap(), Some(resolved("v1", 1)));

        let wrote = store
            .update("k", &mut |current| {
                assert_eq!(current.map(|c| c.version_id.as_str()), Some("v1"));
                Some(resolved("v2", 2))
            })
            .unwrap();
        assert!(wrote);
        assert_eq!(store.get("k").unwrap(), Some(resolved("v2", 2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_declined_on_vacant_key_stores_nothing() {
        let store = MemoryStore::new();
        assert!(!store.update("k", &mut |_| None).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_iter_is_restartable() {
        let store = MemoryStore::new();
        store.put("a", resolved("v1", 1)).unwrap();
        store.put("b", resolved("v2", 2)).unwrap();

        let mut first: Vec<String> = store.iter().map(|e| e.unwrap().0).collect();
        let mut second: Vec<String> = store.iter().map(|e| e.unwrap().0).collect();
        first.sort();
        second.sort();
        assert_eq!(first, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(first, second);
    }
}
