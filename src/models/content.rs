//! Represents an object payload fetched for a single ingestion.

use bytes::Bytes;
use std::collections::BTreeMap;

/// Media type assumed when the object store declared none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Bytes and declared metadata of one stored object.
///
/// Owned by the pipeline for the duration of one record's processing.
#[derive(Clone, Debug)]
pub struct RawFileContent {
    /// Object payload.
    pub body: Bytes,

    /// Content type declared at upload time, if any.
    pub content_type: Option<String>,

    /// Last path segment of the object key.
    pub file_name: String,

    /// User-defined metadata attached at upload time.
    pub metadata: BTreeMap<String, String>,
}

impl RawFileContent {
    /// Declared content type, falling back to `application/octet-stream`.
    pub fn declared_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}
