//! Object-notification wire types
//!
//! Shape of the batches the hosting event source delivers when objects are
//! created in the episode store. Only the fields the pipeline acts on are
//! modeled; everything else in the payload is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Event-name prefix marking a notification as an object creation
const CREATION_PREFIX: &str = "ObjectCreated";

/// A batch of object notifications, delivered as one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationBatch {
    /// Notifications in delivery order
    #[serde(rename = "Records")]
    pub records: Vec<ObjectNotification>,
}

impl NotificationBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// One object notification within a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectNotification {
    /// Event type tag, e.g. `ObjectCreated:Put`
    #[serde(rename = "eventName")]
    pub event_name: String,
    /// Store entity the event refers to
    pub s3: StoreEntity,
}

impl ObjectNotification {
    /// Whether this notification reports an object creation
    pub fn is_creation(&self) -> bool {
        self.event_name.starts_with(CREATION_PREFIX)
    }

    pub fn bucket_name(&self) -> &str {
        &self.s3.bucket.name
    }

    /// Store-relative object key, still in its query-escaped wire form
    pub fn object_key(&self) -> &str {
        &self.s3.object.key
    }

    /// Convenience constructor for a creation notification
    pub fn created(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            event_name: format!("{CREATION_PREFIX}:Put"),
            s3: StoreEntity {
                bucket: BucketRef { name: bucket.into() },
                object: ObjectRef {
                    key: key.into(),
                    size: None,
                },
            },
        }
    }
}

/// Store container and object reference within a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

/// Store container identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

/// Object reference carried by a notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}
