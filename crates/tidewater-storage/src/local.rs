//! Filesystem object store: one directory per bucket under a root.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::backend::ObjectStore;
use crate::error::{Result, StorageError, StorageErrorCode};

/// Object store rooted at a local directory.
///
/// Keys map to relative paths; `/` in a key becomes a directory separator.
/// Writes go to a sibling temp file and are renamed into place.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the bucket directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the directory cannot be created.
    pub fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        let dir = self.bucket_dir(bucket)?;
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(bucket, &e))
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(StorageError::new(
                StorageErrorCode::InvalidKey,
                bucket,
                "invalid bucket name",
            ));
        }
        Ok(self.root.join(bucket))
    }

    fn existing_bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        let dir = self.bucket_dir(bucket)?;
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StorageError::no_such_bucket(bucket))
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let mut path = self.existing_bucket_dir(bucket)?;
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(StorageError::new(
                    StorageErrorCode::InvalidKey,
                    bucket,
                    format!("invalid object key: {key}"),
                ));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::no_such_key(bucket, key)),
            Err(e) => Err(StorageError::io(bucket, &e)),
        }
    }

    fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(bucket, &e))?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &data).map_err(|e| StorageError::io(bucket, &e))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::io(bucket, &e))?;
        tracing::debug!(bucket, key, bytes = data.len(), "Object written");
        Ok(())
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let dir = self.existing_bucket_dir(bucket)?;
        let mut keys = Vec::new();
        collect_keys(&dir, "", bucket, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

fn collect_keys(dir: &Path, rel: &str, bucket: &str, out: &mut Vec<String>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| StorageError::io(bucket, &e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(bucket, &e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = if rel.is_empty() {
            name
        } else {
            format!("{rel}/{name}")
        };
        let file_type = entry.file_type().map_err(|e| StorageError::io(bucket, &e))?;
        if file_type.is_dir() {
            collect_keys(&entry.path(), &key, bucket, out)?;
        } else if !key.ends_with(".tmp") {
            out.push(key);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_colon_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.ensure_bucket("ingestion").unwrap();

        let key = "2024-02-15T19:01:53/address.pqt";
        store.put("ingestion", key, Bytes::from_static(b"PAR1")).unwrap();
        assert_eq!(store.get("ingestion", key).unwrap(), Bytes::from_static(b"PAR1"));
        assert!(dir.path().join("ingestion/2024-02-15T19:01:53/address.pqt").is_file());
    }

    #[test]
    fn missing_key_and_bucket_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.ensure_bucket("control_bucket").unwrap();

        let err = store.get("control_bucket", "last_successful_extraction.txt").unwrap_err();
        assert!(err.is_no_such_key());

        let err = store.get("elsewhere", "k").unwrap_err();
        assert_eq!(err.code, StorageErrorCode::NoSuchBucket);
    }

    #[test]
    fn list_walks_nested_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.ensure_bucket("b").unwrap();
        store.put("b", "2024-02-01T00:00:00/staff.pqt", Bytes::new()).unwrap();
        store.put("b", "2024-02-01T00:00:00/address.pqt", Bytes::new()).unwrap();
        store.put("b", "marker.txt", Bytes::new()).unwrap();

        assert_eq!(
            store.list("b", "2024-02-01").unwrap(),
            vec![
                "2024-02-01T00:00:00/address.pqt",
                "2024-02-01T00:00:00/staff.pqt"
            ]
        );
        assert_eq!(store.list("b", "").unwrap().len(), 3);
    }

    #[test]
    fn rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.ensure_bucket("b").unwrap();
        let err = store.put("b", "../escape.pqt", Bytes::new()).unwrap_err();
        assert_eq!(err.code, StorageErrorCode::InvalidKey);
        let err = store.get("b", "a//b").unwrap_err();
        assert_eq!(err.code, StorageErrorCode::InvalidKey);
    }
}
