//! In-memory object store test double
//!
//! Mirrors the semantics of the filesystem store without touching disk, and
//! adds failure injection so the rename failure paths (copy refused, delete
//! refused after a successful copy) can be exercised deterministically.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ObjectMeta, ObjectPage, ObjectStore, StoreError, Visibility};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    last_modified: DateTime<Utc>,
    visibility: Visibility,
}

/// In-memory [`ObjectStore`] with injectable failures
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
    page_size: usize,
    fail_copy: AtomicBool,
    fail_delete: AtomicBool,
    fail_put: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            page_size: page_size.max(1),
            fail_copy: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_put: AtomicBool::new(false),
        }
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.lock().entry(bucket.to_string()).or_default();
    }

    /// Seed an object with the current timestamp
    pub fn insert_object(&self, bucket: &str, key: &str, body: &[u8]) {
        self.insert_object_at(bucket, key, body, Utc::now());
    }

    /// Seed an object with an explicit modification timestamp
    pub fn insert_object_at(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        last_modified: DateTime<Utc>,
    ) {
        self.lock().entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                last_modified,
                visibility: Visibility::Private,
            },
        );
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.lock()
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key))
    }

    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object_body(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.body.clone())
    }

    pub fn visibility_of(&self, bucket: &str, key: &str) -> Option<Visibility> {
        self.lock()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.visibility)
    }

    /// Make every subsequent copy fail
    pub fn fail_copies(&self) {
        self.fail_copy.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent delete fail
    pub fn fail_deletes(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent put fail
    pub fn fail_puts(&self) {
        self.fail_put.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, BTreeMap<String, StoredObject>>> {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ObjectPage, StoreError> {
        let buckets = self.lock();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;

        let matching: Vec<(&String, &StoredObject)> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| page_token.map_or(true, |token| key.as_str() > token))
            .collect();

        let page: Vec<ObjectMeta> = matching
            .iter()
            .take(self.page_size)
            .map(|(key, object)| ObjectMeta {
                key: (*key).clone(),
                size: object.body.len() as u64,
                last_modified: object.last_modified,
            })
            .collect();
        let next_token = if matching.len() > self.page_size {
            page.last().map(|meta| meta.key.clone())
        } else {
            None
        };

        Ok(ObjectPage {
            objects: page,
            next_token,
        })
    }

    async fn copy(
        &self,
        bucket: &str,
        src_key: &str,
        dst_key: &str,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(StoreError::backend("copy", dst_key, "injected copy failure"));
        }
        let mut buckets = self.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        let source = objects
            .get(src_key)
            .ok_or_else(|| StoreError::ObjectNotFound(src_key.to_string()))?
            .clone();
        objects.insert(
            dst_key.to_string(),
            StoredObject {
                body: source.body,
                last_modified: Utc::now(),
                visibility,
            },
        );
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::backend("delete", key, "injected delete failure"));
        }
        let mut buckets = self.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::ObjectNotFound(key.to_string()))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::backend("put", key, "injected put failure"));
        }
        self.lock().entry(bucket.to_string()).or_default().insert(
            key.to_string(),
            StoredObject {
                body,
                last_modified: Utc::now(),
                visibility,
            },
        );
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, StoreError> {
        Ok(self
            .lock()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| ObjectMeta {
                key: key.to_string(),
                size: object.body.len() as u64,
                last_modified: object.last_modified,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_honors_prefix_and_pagination() {
        let store = MemoryStore::with_page_size(2);
        store.insert_object("b", "processed/a.mp3", b"1");
        store.insert_object("b", "processed/b.mp3", b"22");
        store.insert_object("b", "processed/c.mp3", b"333");
        store.insert_object("b", "incoming/d.mp3", b"4444");

        let first = store.list("b", "processed/", None).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        let token = first.next_token.unwrap();

        let second = store.list("b", "processed/", Some(&token)).await.unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].key, "processed/c.mp3");
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn injected_delete_failure_leaves_object() {
        let store = MemoryStore::new();
        store.insert_object("b", "incoming/1.mp3", b"x");
        store.fail_deletes();

        assert!(store.delete("b", "incoming/1.mp3").await.is_err());
        assert!(store.contains("b", "incoming/1.mp3"));
    }
}
