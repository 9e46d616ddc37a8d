//! Batch ingestion entry point
//!
//! Consumes one notification batch end to end: normalizes every created
//! object, re-lists the canonical catalog, renders the feed, and republishes
//! it at the well-known key. Any failure aborts the batch; the feed is only
//! rewritten after every notification processed cleanly.

use std::sync::Arc;

use castpipe_common::events::NotificationBatch;
use castpipe_common::IngestConfig;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::services::episode_catalog::{EpisodeCatalog, ListError};
use crate::services::episode_normalizer::{EpisodeNormalizer, NormalizeError};
use crate::services::feed_generator::FeedGenerator;
use crate::services::show_name_resolver::ShowNameSource;
use crate::store::{ObjectStore, StoreError, Visibility};

const FEED_CONTENT_TYPE: &str = "application/rss+xml";

/// Batch ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// The hosting trigger contractually supplies a non-empty batch
    #[error("Notification batch contains no records")]
    EmptyBatch,

    /// Object key could not be unescaped
    #[error("Error parsing file path {key}: {cause}")]
    InvalidKey { key: String, cause: String },

    /// Normalization of one record failed; the batch is aborted
    #[error("Failed to rename and move new episode: {0}")]
    Normalize(#[from] NormalizeError),

    /// Catalog listing failed; the feed is not regenerated
    #[error(transparent)]
    List(#[from] ListError),

    /// The rendered feed could not be written back to the store
    #[error("Error uploading feed document to store: {0}")]
    Publish(#[source] StoreError),
}

/// Composes normalizer, catalog, and generator over one shared store
pub struct IngestionOrchestrator {
    store: Arc<dyn ObjectStore>,
    normalizer: EpisodeNormalizer,
    catalog: EpisodeCatalog,
    generator: FeedGenerator,
    publish_key: String,
}

impl IngestionOrchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        show_names: Arc<dyn ShowNameSource>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            normalizer: EpisodeNormalizer::new(
                store.clone(),
                show_names,
                config.processed_prefix.clone(),
            ),
            catalog: EpisodeCatalog::new(store.clone(), config.processed_prefix.clone()),
            generator: FeedGenerator::new(config.base_url.clone()),
            publish_key: config.publish_key.clone(),
            store,
        }
    }

    /// Process one notification batch to completion
    pub async fn handle_batch(&self, batch: &NotificationBatch) -> Result<(), IngestError> {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            records = batch.len(),
            "handling the modification of objects"
        );
        if batch.is_empty() {
            return Err(IngestError::EmptyBatch);
        }

        // A batch never spans containers; the first record is authoritative.
        let bucket = batch.records[0].bucket_name().to_string();

        for record in &batch.records {
            if !record.is_creation() {
                debug!(event = %record.event_name, "skipping non-creation notification");
                continue;
            }
            let key = unescape_key(record.object_key()).map_err(|cause| {
                IngestError::InvalidKey {
                    key: record.object_key().to_string(),
                    cause,
                }
            })?;
            self.normalizer.normalize(&bucket, &key).await?;
        }

        let mut episodes = self.catalog.list_episodes(&bucket).await?;
        // Explicit ordering key; store enumeration order is not part of the
        // feed's determinism contract.
        episodes.sort_by(|a, b| a.path.cmp(&b.path));

        let feed = self.generator.render(&episodes);
        self.store
            .put(
                &bucket,
                &self.publish_key,
                feed.into_bytes(),
                FEED_CONTENT_TYPE,
                Visibility::PublicRead,
            )
            .await
            .map_err(IngestError::Publish)?;

        info!(
            run_id = %run_id,
            episodes = episodes.len(),
            key = %self.publish_key,
            "feed document republished"
        );
        Ok(())
    }
}

/// Query-unescape an object key: `+` means space, `%xx` is percent-encoded
fn unescape_key(key: &str) -> Result<String, String> {
    let plus_decoded = key.replace('+', " ");
    urlencoding::decode(&plus_decoded)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use castpipe_common::config::TomlConfig;
    use castpipe_common::events::ObjectNotification;
    use serial_test::serial;

    use crate::services::show_name_resolver::StaticShowNames;
    use crate::store::MemoryStore;

    const BUCKET: &str = "atp-episodes";

    fn test_config() -> IngestConfig {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            base_url = "https://episodes.example.com"
            showbot_url = "ws://unused.example.com/"
            "#,
        )
        .unwrap();
        IngestConfig::resolve(toml_config).unwrap()
    }

    fn orchestrator(
        store: Arc<MemoryStore>,
        show_names: StaticShowNames,
    ) -> IngestionOrchestrator {
        IngestionOrchestrator::new(store, Arc::new(show_names), &test_config())
    }

    fn batch(records: Vec<ObjectNotification>) -> NotificationBatch {
        NotificationBatch { records }
    }

    #[test]
    fn unescapes_query_encoded_keys() {
        assert_eq!(
            unescape_key("incoming/Text+File+%281%29.mp3").unwrap(),
            "incoming/Text File (1).mp3"
        );
        assert_eq!(unescape_key("incoming/42.mp3").unwrap(), "incoming/42.mp3");
        assert!(unescape_key("incoming/%FF.mp3").is_err());
    }

    #[tokio::test]
    #[serial]
    async fn empty_batch_is_a_contract_violation() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(store, StaticShowNames::with_title("Episode 300"));

        let err = orchestrator.handle_batch(&batch(vec![])).await.unwrap_err();
        assert!(matches!(err, IngestError::EmptyBatch));
    }

    #[tokio::test]
    #[serial]
    async fn non_creation_batch_still_republishes_the_feed() {
        let store = Arc::new(MemoryStore::new());
        store.insert_object(BUCKET, "processed/Old Episode.mp3", b"audio");
        let orchestrator =
            orchestrator(store.clone(), StaticShowNames::with_title("Episode 300"));

        let mut record = ObjectNotification::created(BUCKET, "incoming/ignored.mp3");
        record.event_name = "ObjectRemoved:Delete".to_string();
        orchestrator.handle_batch(&batch(vec![record])).await.unwrap();

        let feed = store.object_body(BUCKET, "feed.rss").expect("feed published");
        let feed = String::from_utf8(feed).unwrap();
        assert!(feed.contains("Old Episode"));
        assert_eq!(
            store.visibility_of(BUCKET, "feed.rss"),
            Some(Visibility::PublicRead)
        );
    }

    #[tokio::test]
    #[serial]
    async fn normalization_failure_aborts_without_publishing() {
        let store = Arc::new(MemoryStore::new());
        store.insert_object(BUCKET, "incoming/42.mp3", b"audio");
        store.fail_copies();
        let orchestrator =
            orchestrator(store.clone(), StaticShowNames::with_title("Episode 300"));

        let record = ObjectNotification::created(BUCKET, "incoming/42.mp3");
        let err = orchestrator.handle_batch(&batch(vec![record])).await.unwrap_err();

        assert!(matches!(err, IngestError::Normalize(_)));
        assert!(!store.contains(BUCKET, "feed.rss"));
    }

    #[tokio::test]
    #[serial]
    async fn invalid_key_aborts_the_batch() {
        let store = Arc::new(MemoryStore::new());
        store.create_bucket(BUCKET);
        let orchestrator =
            orchestrator(store.clone(), StaticShowNames::with_title("Episode 300"));

        let record = ObjectNotification::created(BUCKET, "incoming/%FF.mp3");
        let err = orchestrator.handle_batch(&batch(vec![record])).await.unwrap_err();

        assert!(matches!(err, IngestError::InvalidKey { .. }));
        assert!(!store.contains(BUCKET, "feed.rss"));
    }

    #[tokio::test]
    #[serial]
    async fn feed_items_are_sorted_by_path() {
        let store = Arc::new(MemoryStore::new());
        store.insert_object(BUCKET, "processed/Zulu.mp3", b"z");
        store.insert_object(BUCKET, "processed/Alpha.mp3", b"a");
        let orchestrator =
            orchestrator(store.clone(), StaticShowNames::with_title("Episode 300"));

        let mut record = ObjectNotification::created(BUCKET, "unused");
        record.event_name = "ObjectRemoved:Delete".to_string();
        orchestrator.handle_batch(&batch(vec![record])).await.unwrap();

        let feed = String::from_utf8(store.object_body(BUCKET, "feed.rss").unwrap()).unwrap();
        assert!(feed.find("Alpha").unwrap() < feed.find("Zulu").unwrap());
    }
}
