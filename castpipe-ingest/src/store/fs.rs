//! Filesystem-backed object store
//!
//! Buckets are subdirectories of a configured root, keys are relative paths
//! within them. Visibility flags are accepted and recorded at trace level
//! only; a directory store has no ACLs to apply.

use std::fs;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use super::{ObjectMeta, ObjectPage, ObjectStore, StoreError, Visibility};

/// Directory-backed [`ObjectStore`] implementation
pub struct FsObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            root: root.into(),
            page_size: page_size.max(1),
        }
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    /// Resolve a key to a path inside the bucket, rejecting traversal
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "empty",
            });
        }
        let relative = Path::new(key);
        if relative.is_absolute() {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "absolute path",
            });
        }
        let mut resolved = self.bucket_dir(bucket);
        for component in relative.components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                _ => {
                    return Err(StoreError::InvalidKey {
                        key: key.to_string(),
                        reason: "path traversal",
                    });
                }
            }
        }
        Ok(resolved)
    }

    fn meta_for(path: &Path, key: String) -> Result<ObjectMeta, StoreError> {
        let metadata =
            fs::metadata(path).map_err(|e| StoreError::backend("head", key.clone(), e))?;
        let modified = metadata
            .modified()
            .map_err(|e| StoreError::backend("head", key.clone(), e))?;
        Ok(ObjectMeta {
            key,
            size: metadata.len(),
            last_modified: DateTime::<Utc>::from(modified),
        })
    }

    /// Relative path rendered as a store key with `/` separators
    fn key_for(bucket_dir: &Path, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(bucket_dir).ok()?;
        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if segments.is_empty() {
            None
        } else {
            Some(segments.join("/"))
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ObjectPage, StoreError> {
        let bucket_dir = self.bucket_dir(bucket);
        if !bucket_dir.is_dir() {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&bucket_dir) {
            let entry =
                entry.map_err(|e| StoreError::backend("list", prefix.to_string(), e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(key) = Self::key_for(&bucket_dir, entry.path()) {
                if key.starts_with(prefix) {
                    keys.push((key, entry.path().to_path_buf()));
                }
            }
        }
        keys.sort_by(|a, b| a.0.cmp(&b.0));

        let start = match page_token {
            Some(token) => keys.iter().position(|(key, _)| key.as_str() > token),
            None => Some(0),
        };
        let Some(start) = start else {
            return Ok(ObjectPage {
                objects: Vec::new(),
                next_token: None,
            });
        };

        let remaining = keys.len() - start;
        let page: Vec<ObjectMeta> = keys[start..]
            .iter()
            .take(self.page_size)
            .map(|(key, path)| Self::meta_for(path, key.clone()))
            .collect::<Result<_, _>>()?;
        let next_token = if remaining > self.page_size {
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
        let src = self.object_path(bucket, src_key)?;
        let dst = self.object_path(bucket, dst_key)?;
        if !src.is_file() {
            return Err(StoreError::ObjectNotFound(src_key.to_string()));
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::backend("copy.create_parent", dst_key, e))?;
        }
        fs::copy(&src, &dst).map_err(|e| StoreError::backend("copy", dst_key, e))?;
        tracing::trace!(key = dst_key, ?visibility, "visibility recorded, not applied");
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::ObjectNotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::backend("delete", key, e)),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::backend("put.create_parent", key, e))?;
        }
        fs::write(&path, body).map_err(|e| StoreError::backend("put", key, e))?;
        tracing::trace!(
            key,
            content_type,
            ?visibility,
            "object written to filesystem store"
        );
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, StoreError> {
        let path = self.object_path(bucket, key)?;
        if !path.is_file() {
            return Ok(None);
        }
        Self::meta_for(&path, key.to_string()).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BUCKET: &str = "episodes";

    fn store_with_bucket(page_size: usize) -> (TempDir, FsObjectStore) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(BUCKET)).unwrap();
        let store = FsObjectStore::new(temp.path(), page_size);
        (temp, store)
    }

    #[tokio::test]
    async fn put_head_roundtrip() {
        let (_temp, store) = store_with_bucket(100);
        store
            .put(BUCKET, "processed/a.mp3", b"abc".to_vec(), "audio/mpeg", Visibility::PublicRead)
            .await
            .unwrap();

        let meta = store.head(BUCKET, "processed/a.mp3").await.unwrap().unwrap();
        assert_eq!(meta.key, "processed/a.mp3");
        assert_eq!(meta.size, 3);
        assert!(store.head(BUCKET, "processed/missing.mp3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_paginates_in_key_order() {
        let (_temp, store) = store_with_bucket(2);
        for name in ["c", "a", "b", "d"] {
            store
                .put(
                    BUCKET,
                    &format!("processed/{name}.mp3"),
                    vec![0u8; 4],
                    "audio/mpeg",
                    Visibility::Private,
                )
                .await
                .unwrap();
        }
        // Outside the prefix, must not appear
        store
            .put(BUCKET, "incoming/x.mp3", vec![0u8; 1], "audio/mpeg", Visibility::Private)
            .await
            .unwrap();

        let first = store.list(BUCKET, "processed/", None).await.unwrap();
        let keys: Vec<_> = first.objects.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, ["processed/a.mp3", "processed/b.mp3"]);
        let token = first.next_token.expect("more pages expected");

        let second = store.list(BUCKET, "processed/", Some(&token)).await.unwrap();
        let keys: Vec<_> = second.objects.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, ["processed/c.mp3", "processed/d.mp3"]);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn copy_then_delete_moves_object() {
        let (_temp, store) = store_with_bucket(100);
        store
            .put(BUCKET, "incoming/42.mp3", b"audio".to_vec(), "audio/mpeg", Visibility::Private)
            .await
            .unwrap();

        store
            .copy(BUCKET, "incoming/42.mp3", "processed/Show.mp3", Visibility::PublicRead)
            .await
            .unwrap();
        store.delete(BUCKET, "incoming/42.mp3").await.unwrap();

        assert!(store.head(BUCKET, "incoming/42.mp3").await.unwrap().is_none());
        let meta = store.head(BUCKET, "processed/Show.mp3").await.unwrap().unwrap();
        assert_eq!(meta.size, 5);
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_temp, store) = store_with_bucket(100);
        let err = store.head(BUCKET, "../outside.mp3").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn missing_bucket_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp.path(), 10);
        let err = store.list("absent", "processed/", None).await.unwrap_err();
        assert!(matches!(err, StoreError::BucketNotFound(_)));
    }
}
