//! Key-value storage supplied by the host, plus a write-buffering overlay so
//! that a sync call either commits all of its writes or none of them.

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::error::HeaderSyncError;

/// The host key-value store the synchroniser persists its state in.
pub trait Storage {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &[u8], value: &[u8]);
    /// Removes the value stored under `key`.
    fn remove(&mut self, key: &[u8]);
}

/// An in-memory [`Storage`], ordered by key.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[allow(clippy::module_name_repetitions)]
pub struct MemoryStorage(#[serde_as(as = "BTreeMap<Hex, Hex>")] BTreeMap<Vec<u8>, Vec<u8>>);

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.0.insert(key.to_vec(), value.to_vec());
    }

    fn remove(&mut self, key: &[u8]) {
        self.0.remove(key);
    }
}

/// Buffers writes on top of a read-only view of another store.
#[allow(clippy::module_name_repetitions)]
pub struct CacheStorage<'a> {
    inner: &'a dyn Storage,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

/// Writes collected by a [`CacheStorage`], `None` marking a removal.
#[derive(Debug, Default)]
pub struct PendingWrites(BTreeMap<Vec<u8>, Option<Vec<u8>>>);

impl<'a> CacheStorage<'a> {
    /// Wraps `inner` without modifying it.
    #[must_use]
    pub fn new(inner: &'a dyn Storage) -> Self {
        Self {
            inner,
            writes: BTreeMap::new(),
        }
    }

    /// Releases the borrow on the underlying store, keeping the buffered writes.
    #[must_use]
    pub fn into_writes(self) -> PendingWrites {
        PendingWrites(self.writes)
    }
}

impl PendingWrites {
    /// Number of buffered writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies every buffered write to `storage`.
    pub fn apply(self, storage: &mut dyn Storage) {
        for (key, value) in self.0 {
            match value {
                Some(value) => storage.set(&key, &value),
                None => storage.remove(&key),
            }
        }
    }
}

impl Storage for CacheStorage<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(buffered) => buffered.clone(),
            None => self.inner.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn remove(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }
}

/// Runs `f` against a write buffer over `storage` and applies the writes only
/// if `f` succeeds.
///
/// # Errors
/// Returns the error of `f`, in which case `storage` is left untouched.
pub fn transact<T, E>(
    storage: &mut dyn Storage,
    f: impl FnOnce(&mut CacheStorage<'_>) -> Result<T, E>,
) -> Result<T, E> {
    let (value, writes) = {
        let mut cache = CacheStorage::new(&*storage);
        let value = f(&mut cache)?;
        (value, cache.into_writes())
    };
    writes.apply(storage);
    Ok(value)
}

/// Loads a JSON encoded value.
///
/// # Errors
/// Returns [`HeaderSyncError::CorruptedState`] if the stored bytes do not decode.
pub fn load<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Option<T>, HeaderSyncError> {
    storage
        .get(key.as_bytes())
        .map(|bz| {
            serde_json::from_slice(&bz).map_err(|e| HeaderSyncError::CorruptedState {
                key: key.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Stores a value as JSON.
///
/// # Errors
/// Returns [`HeaderSyncError::CorruptedState`] if the value cannot be encoded.
pub fn save<T: Serialize>(
    storage: &mut dyn Storage,
    key: &str,
    value: &T,
) -> Result<(), HeaderSyncError> {
    let bz = serde_json::to_vec(value).map_err(|e| HeaderSyncError::CorruptedState {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    storage.set(key.as_bytes(), &bz);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_reads_through_and_shadows() {
        let mut store = MemoryStorage::new();
        store.set(b"a", b"1");
        store.set(b"b", b"2");

        let mut cache = CacheStorage::new(&store);
        cache.set(b"a", b"10");
        cache.remove(b"b");
        cache.set(b"c", b"3");

        assert_eq!(cache.get(b"a"), Some(b"10".to_vec()));
        assert_eq!(cache.get(b"b"), None);
        assert_eq!(cache.get(b"c"), Some(b"3".to_vec()));

        let writes = cache.into_writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(store.get(b"a"), Some(b"1".to_vec()));

        writes.apply(&mut store);
        assert_eq!(store.get(b"a"), Some(b"10".to_vec()));
        assert_eq!(store.get(b"b"), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn transact_discards_writes_on_error() {
        let mut store = MemoryStorage::new();
        store.set(b"height", b"1");

        let res: Result<(), &str> = transact(&mut store, |cache| {
            cache.set(b"height", b"2");
            cache.set(b"other", b"x");
            Err("boom")
        });
        assert_eq!(res, Err("boom"));
        assert_eq!(store.get(b"height"), Some(b"1".to_vec()));
        assert_eq!(store.get(b"other"), None);

        let res: Result<(), ()> = transact(&mut store, |cache| {
            cache.set(b"height", b"2");
            Ok(())
        });
        assert!(res.is_ok());
        assert_eq!(store.get(b"height"), Some(b"2".to_vec()));
    }

    #[test]
    fn load_reports_corrupted_values() {
        let mut store = MemoryStorage::new();
        save(&mut store, "n", &7u64).unwrap();
        assert_eq!(load::<u64>(&store, "n").unwrap(), Some(7));
        assert_eq!(load::<u64>(&store, "missing").unwrap(), None);

        store.set(b"n", b"not json");
        assert!(matches!(
            load::<u64>(&store, "n"),
            Err(HeaderSyncError::CorruptedState { key, .. }) if key == "n"
        ));
    }

    #[test]
    fn memory_storage_serializes_as_hex_map() {
        let mut store = MemoryStorage::new();
        store.set(b"k", b"v");
        let json = serde_json::to_string(&store).unwrap();
        assert_eq!(json, r#"{"6b":"76"}"#);
        assert_eq!(serde_json::from_str::<MemoryStorage>(&json).unwrap(), store);
    }
}
