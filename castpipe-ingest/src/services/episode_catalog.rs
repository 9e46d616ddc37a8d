//! Canonical episode catalog
//!
//! The authoritative set of published episodes is whatever currently lives
//! under the canonical namespace prefix; it is re-listed from the store on
//! every invocation, never cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::store::{ObjectMeta, ObjectStore, StoreError};

/// One published episode object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeFile {
    /// Store-relative path under the canonical namespace
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification timestamp, used as the publication date
    pub last_modified: DateTime<Utc>,
}

impl From<ObjectMeta> for EpisodeFile {
    fn from(meta: ObjectMeta) -> Self {
        Self {
            path: meta.key,
            size: meta.size,
            last_modified: meta.last_modified,
        }
    }
}

/// Catalog listing errors
#[derive(Debug, Error)]
pub enum ListError {
    /// Underlying enumeration failed; no partial results are returned
    #[error("Error getting list of processed files: {0}")]
    Enumeration(#[source] StoreError),
}

/// Lists the full set of canonical episode objects
pub struct EpisodeCatalog {
    store: Arc<dyn ObjectStore>,
    processed_prefix: String,
}

impl EpisodeCatalog {
    pub fn new(store: Arc<dyn ObjectStore>, processed_prefix: impl Into<String>) -> Self {
        Self {
            store,
            processed_prefix: processed_prefix.into(),
        }
    }

    /// Enumerate every canonical episode, paginating until exhausted
    pub async fn list_episodes(&self, bucket: &str) -> Result<Vec<EpisodeFile>, ListError> {
        let mut episodes = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .store
                .list(bucket, &self.processed_prefix, page_token.as_deref())
                .await
                .map_err(ListError::Enumeration)?;
            episodes.extend(page.objects.into_iter().map(EpisodeFile::from));
            match page.next_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = episodes.len(), "canonical episodes listed");
        Ok(episodes)
    }
}
