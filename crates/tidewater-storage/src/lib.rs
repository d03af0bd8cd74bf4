//! Object storage for staged and transformed Parquet objects.
//!
//! Provides the [`ObjectStore`] trait with an in-memory backend
//! ([`MemoryObjectStore`]) and a directory-per-bucket filesystem backend
//! ([`LocalObjectStore`]), plus the Parquet encode/decode helpers used by
//! every pipeline step.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod local;
pub mod memory;
pub mod parquet;

pub use backend::ObjectStore;
pub use error::{StorageError, StorageErrorCode};
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use parquet::{decode_batches, decode_single, encode_batch, CodecError};
