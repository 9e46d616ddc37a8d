//! Episode rename and normalization
//!
//! Decides, per created object, whether it follows the incoming naming
//! convention (`<digits>.mp3`). Conforming uploads are renamed into the
//! canonical namespace under the currently most-voted show title; anything
//! else passes through untouched. The rename is a two-phase copy-verify-
//! delete so the original is only removed once the copy's postcondition
//! holds.

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::services::show_name_resolver::ShowNameSource;
use crate::store::{ObjectStore, StoreError, Visibility};

static CANONICAL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.mp3$").expect("canonical name pattern"));

/// Normalization errors
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Copy into the canonical namespace failed; the original is untouched
    #[error("Failed to copy episode to {dst_key}: {cause}")]
    Copy { dst_key: String, cause: String },

    /// Delete failed after a verified copy; two live copies now exist and
    /// require human intervention, not an automatic retry
    #[error(
        "Copied {src_key} to {dst_key} but failed to delete the original; \
         state is inconsistent: {cause}"
    )]
    InconsistentState {
        src_key: String,
        dst_key: String,
        cause: String,
    },

    /// Underlying store failure outside the copy/delete phases
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Renames newly created episode objects into the canonical namespace
pub struct EpisodeNormalizer {
    store: Arc<dyn ObjectStore>,
    show_names: Arc<dyn ShowNameSource>,
    processed_prefix: String,
}

impl EpisodeNormalizer {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        show_names: Arc<dyn ShowNameSource>,
        processed_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            show_names,
            processed_prefix: processed_prefix.into(),
        }
    }

    /// Normalize one created object
    ///
    /// Succeeds without store mutation for non-conforming names and for
    /// conforming names whose show title could not be resolved (degraded
    /// mode, logged at warn).
    pub async fn normalize(&self, bucket: &str, object_path: &str) -> Result<(), NormalizeError> {
        let Some(file_name) = base_name(object_path) else {
            warn!(path = object_path, "object path has no base name, keeping as-is");
            return Ok(());
        };

        if !CANONICAL_NAME.is_match(file_name) {
            info!(
                file_name,
                "created object does not follow new episode naming scheme, keeping current name"
            );
            return Ok(());
        }

        // Re-derived on every conforming creation event, by design.
        let title = match self.show_names.resolve_show_name().await {
            Ok(title) => title,
            Err(e) => {
                warn!(
                    error = %e,
                    file_name,
                    "error getting most recent show name, keeping current name"
                );
                return Ok(());
            }
        };

        let dst_key = format!("{}{}.mp3", self.processed_prefix, title);
        self.rename(bucket, object_path, &dst_key).await
    }

    /// Two-phase rename: copy, verify the destination, then delete
    async fn rename(
        &self,
        bucket: &str,
        src_key: &str,
        dst_key: &str,
    ) -> Result<(), NormalizeError> {
        let source = self
            .store
            .head(bucket, src_key)
            .await?
            .ok_or_else(|| StoreError::ObjectNotFound(src_key.to_string()))?;

        self.store
            .copy(bucket, src_key, dst_key, Visibility::PublicRead)
            .await
            .map_err(|e| NormalizeError::Copy {
                dst_key: dst_key.to_string(),
                cause: e.to_string(),
            })?;

        // Postcondition check before the destructive phase: the destination
        // must exist and match the source size, otherwise the original stays.
        let copied = self.store.head(bucket, dst_key).await?;
        match copied {
            None => {
                return Err(NormalizeError::Copy {
                    dst_key: dst_key.to_string(),
                    cause: "destination missing after copy".to_string(),
                })
            }
            Some(meta) if meta.size != source.size => {
                return Err(NormalizeError::Copy {
                    dst_key: dst_key.to_string(),
                    cause: format!(
                        "destination size {} does not match source size {}",
                        meta.size, source.size
                    ),
                })
            }
            Some(_) => {}
        }

        self.store
            .delete(bucket, src_key)
            .await
            .map_err(|e| NormalizeError::InconsistentState {
                src_key: src_key.to_string(),
                dst_key: dst_key.to_string(),
                cause: e.to_string(),
            })?;

        info!(src_key, dst_key, "episode renamed into canonical namespace");
        Ok(())
    }
}

/// Final path segment, `None` for paths with no usable base name
fn base_name(object_path: &str) -> Option<&str> {
    Path::new(object_path)
        .file_name()
        .and_then(|name| name.to_str())
}
