//! Object store trait definition.

use bytes::Bytes;

use crate::error;

/// Durable blob storage addressed by `(bucket, key)`.
///
/// Implementations must give read-after-write consistency per key and be
/// `Send + Sync` for use behind `Arc<dyn ObjectStore>`.
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's full body.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`](crate::StorageError) with code
    /// [`NoSuchKey`](crate::StorageErrorCode::NoSuchKey) when the key is
    /// absent, or another code on access failure.
    fn get(&self, bucket: &str, key: &str) -> error::Result<Bytes>;

    /// Create or replace an object.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`](crate::StorageError) on storage failure.
    fn put(&self, bucket: &str, key: &str, data: Bytes) -> error::Result<()>;

    /// List keys under `prefix`, in lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`](crate::StorageError) on storage failure.
    fn list(&self, bucket: &str, prefix: &str) -> error::Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn ObjectStore`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn ObjectStore) {}
    }
}
