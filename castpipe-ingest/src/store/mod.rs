//! Blob store abstraction
//!
//! The pipeline only ever talks to the episode store through [`ObjectStore`];
//! transport and authentication live behind the trait. Two implementations
//! ship with the service: a filesystem-backed store used by the binary and a
//! fully in-memory store used by the tests.

mod fs;
mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Blob store errors, reported as the failed operation plus a cause
#[derive(Debug, Error)]
pub enum StoreError {
    /// Requested container does not exist
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// Operation requires an object that does not exist
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Key escapes the store namespace or is otherwise malformed
    #[error("Invalid object key {key}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Opaque backend failure
    #[error("Store operation {operation} failed on {key}: {cause}")]
    Backend {
        operation: &'static str,
        key: String,
        cause: String,
    },
}

impl StoreError {
    pub(crate) fn backend(
        operation: &'static str,
        key: impl Into<String>,
        cause: impl ToString,
    ) -> Self {
        Self::Backend {
            operation,
            key: key.into(),
            cause: cause.to_string(),
        }
    }
}

/// Visibility applied to a written or copied object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    PublicRead,
}

/// Metadata of one stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Store-relative key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Timestamp when the object was last modified
    pub last_modified: DateTime<Utc>,
}

/// One page of a prefix enumeration
#[derive(Debug, Clone)]
pub struct ObjectPage {
    /// Objects on this page, in ascending key order
    pub objects: Vec<ObjectMeta>,
    /// Continuation token; `None` when the enumeration is exhausted
    pub next_token: Option<String>,
}

/// Abstract blob store collaborator
///
/// Enumeration pages are served in ascending key order, with the
/// continuation token naming the last key already returned.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of objects under `prefix`
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ObjectPage, StoreError>;

    /// Copy an object within the bucket, applying `visibility` to the copy
    async fn copy(
        &self,
        bucket: &str,
        src_key: &str,
        dst_key: &str,
        visibility: Visibility,
    ) -> Result<(), StoreError>;

    /// Delete an object
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;

    /// Write an object wholesale
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        visibility: Visibility,
    ) -> Result<(), StoreError>;

    /// Metadata of a single object, `None` when it does not exist
    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, StoreError>;
}
