//! Inbound storage-change notifications and the object locator derived from them.
//!
//! The wire shape follows the S3 event notification format:
//! `{"Records":[{"s3":{"bucket":{"name":..},"object":{"key":..}}}]}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An ordered batch of change events delivered together.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct NotificationBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

/// A single change event referencing one stored object.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NotificationRecord {
    #[serde(rename = "s3")]
    pub entity: StorageEntity,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StorageEntity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ObjectRef {
    /// URL-encoded object key, with spaces sent as `+`.
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("object key `{raw}` is not valid percent-encoded UTF-8")]
pub struct KeyDecodeError {
    pub raw: String,
}

/// Bucket + decoded key of a stored object.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectLocator {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Resolve the locator named by a notification.
    ///
    /// `+` becomes a space before percent-decoding, so `%2B` still yields a literal `+`.
    pub fn from_notification(record: &NotificationRecord) -> Result<Self, KeyDecodeError> {
        let raw = &record.entity.object.key;
        if has_malformed_escape(raw) {
            return Err(KeyDecodeError { raw: raw.clone() });
        }
        let spaced = raw.replace('+', " ");
        let key = urlencoding::decode(&spaced)
            .map_err(|_| KeyDecodeError { raw: raw.clone() })?
            .into_owned();
        Ok(Self::new(record.entity.bucket.name.clone(), key))
    }

    /// Last `/`-separated segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// File name up to its first `.`; the catalog primary key.
    pub fn file_id(&self) -> &str {
        let name = self.file_name();
        name.split('.').next().unwrap_or(name)
    }
}

/// A `%` not followed by two hex digits.
fn has_malformed_escape(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    memchr::memchr_iter(b'%', bytes).any(|at| {
        bytes
            .get(at + 1..at + 3)
            .is_none_or(|hex| !hex.iter().all(u8::is_ascii_hexdigit))
    })
}
