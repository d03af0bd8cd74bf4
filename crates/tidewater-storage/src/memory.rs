//! In-memory object store for tests and local runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use bytes::Bytes;

use crate::backend::ObjectStore;
use crate::error::{Result, StorageError, StorageErrorCode};

type Buckets = HashMap<String, BTreeMap<String, Bytes>>;

/// Object store backed by a map of buckets. Buckets must be created before use.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<Buckets>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given buckets already present.
    #[must_use]
    pub fn with_buckets(names: &[&str]) -> Self {
        let buckets = names
            .iter()
            .map(|name| ((*name).to_string(), BTreeMap::new()))
            .collect();
        Self {
            buckets: RwLock::new(buckets),
        }
    }

    /// Create a bucket if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the lock is poisoned.
    pub fn create_bucket(&self, name: &str) -> Result<()> {
        self.buckets
            .write()
            .map_err(|_| poisoned(name))?
            .entry(name.to_string())
            .or_default();
        Ok(())
    }
}

fn poisoned(bucket: &str) -> StorageError {
    StorageError::new(StorageErrorCode::Internal, bucket, "lock poisoned")
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let buckets = self.buckets.read().map_err(|_| poisoned(bucket))?;
        buckets
            .get(bucket)
            .ok_or_else(|| StorageError::no_such_bucket(bucket))?
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::no_such_key(bucket, key))
    }

    fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let mut buckets = self.buckets.write().map_err(|_| poisoned(bucket))?;
        buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::no_such_bucket(bucket))?
            .insert(key.to_string(), data);
        Ok(())
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let buckets = self.buckets.read().map_err(|_| poisoned(bucket))?;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::no_such_bucket(bucket))?;
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let store = MemoryObjectStore::with_buckets(&["ingestion"]);
        store
            .put("ingestion", "2024-01-01T00:00:00/staff.pqt", Bytes::from("abc"))
            .unwrap();
        let got = store.get("ingestion", "2024-01-01T00:00:00/staff.pqt").unwrap();
        assert_eq!(got, Bytes::from("abc"));
    }

    #[test]
    fn missing_key_is_distinguished() {
        let store = MemoryObjectStore::with_buckets(&["control_bucket"]);
        let err = store.get("control_bucket", "nope").unwrap_err();
        assert!(err.is_no_such_key());
    }

    #[test]
    fn missing_bucket_is_not_missing_key() {
        let store = MemoryObjectStore::new();
        let err = store.get("ghost", "k").unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NoSuchBucket);
        let err = store.put("ghost", "k", Bytes::new()).unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NoSuchBucket);
    }

    #[test]
    fn list_filters_by_prefix_in_order() {
        let store = MemoryObjectStore::new();
        store.create_bucket("b").unwrap();
        for key in ["2024-02-02T00:00:00/b.pqt", "2024-02-01T00:00:00/a.pqt", "other/c.pqt"] {
            store.put("b", key, Bytes::new()).unwrap();
        }
        assert_eq!(
            store.list("b", "2024-").unwrap(),
            vec!["2024-02-01T00:00:00/a.pqt", "2024-02-02T00:00:00/b.pqt"]
        );
        assert_eq!(store.list("b", "").unwrap().len(), 3);
    }

    #[test]
    fn put_overwrites() {
        let store = MemoryObjectStore::with_buckets(&["b"]);
        store.put("b", "k", Bytes::from("1")).unwrap();
        store.put("b", "k", Bytes::from("2")).unwrap();
        assert_eq!(store.get("b", "k").unwrap(), Bytes::from("2"));
    }
}
