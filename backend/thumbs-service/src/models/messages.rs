//! Broker message bodies
//!
//! Inbound messages arrive on the bucket exchange either as a direct
//! `{"filename": ...}` body or as an S3/MinIO bucket notification. Outbound
//! messages announce a finished photo on the worker exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ThumbnailRef;

/// Why an inbound payload could not be turned into an [`InboundMessage`]
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed message body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bucket notification contains no records")]
    EmptyNotification,

    #[error("Object key is not valid URL encoding: {0}")]
    InvalidKey(String),
}

/// Request to process one uploaded photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Object key of the source photo in the photos bucket
    pub filename: String,
    /// Bucket event name when the message came from a bucket notification
    pub event_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireMessage {
    Notification {
        #[serde(rename = "EventName")]
        event_name: Option<String>,
        #[serde(rename = "Records")]
        records: Vec<NotificationRecord>,
    },
    Direct {
        filename: String,
    },
}

#[derive(Deserialize)]
struct NotificationRecord {
    #[serde(rename = "eventName")]
    event_name: Option<String>,
    s3: NotificationEntity,
}

#[derive(Deserialize)]
struct NotificationEntity {
    object: NotificationObject,
}

#[derive(Deserialize)]
struct NotificationObject {
    key: String,
}

impl NotificationRecord {
    fn into_message(self, fallback_event: Option<&str>) -> Result<InboundMessage, DecodeError> {
        // Notification keys are form-encoded: spaces arrive as '+'.
        let raw_key = self.s3.object.key.replace('+', " ");
        let filename = urlencoding::decode(&raw_key)
            .map_err(|_| DecodeError::InvalidKey(self.s3.object.key.clone()))?
            .into_owned();

        Ok(InboundMessage {
            filename,
            event_name: self
                .event_name
                .or_else(|| fallback_event.map(str::to_string)),
        })
    }
}

impl InboundMessage {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            event_name: None,
        }
    }

    /// Decode a delivery body into the photos it names.
    ///
    /// A direct body names one photo. A bucket notification yields one
    /// message per record, in record order.
    pub fn decode(payload: &[u8]) -> Result<Vec<Self>, DecodeError> {
        match serde_json::from_slice::<WireMessage>(payload)? {
            WireMessage::Direct { filename } => Ok(vec![Self::new(filename)]),
            WireMessage::Notification {
                event_name,
                records,
            } => {
                if records.is_empty() {
                    return Err(DecodeError::EmptyNotification);
                }

                records
                    .into_iter()
                    .map(|record| record.into_message(event_name.as_deref()))
                    .collect()
            }
        }
    }

    /// True unless the message is a bucket notification for something other
    /// than an object being created (e.g. a deletion).
    pub fn is_upload(&self) -> bool {
        match &self.event_name {
            Some(name) => name.contains("ObjectCreated"),
            None => true,
        }
    }
}

/// Completion announcement for a processed photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub filename: String,
    pub thumbnails: Vec<ThumbnailRef>,
    pub processed_at: DateTime<Utc>,
}

impl OutboundMessage {
    pub fn new(filename: impl Into<String>, thumbnails: Vec<ThumbnailRef>) -> Self {
        Self {
            filename: filename.into(),
            thumbnails,
            processed_at: Utc::now(),
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
