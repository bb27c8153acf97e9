//! Represents a cataloged file and the facts extracted from its bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Width/height pair read from an image header.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Format-specific facts. Each field is absent when the format does not
/// apply or the bytes were not recognized.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedAttributes {
    /// Heuristic page count for PDFs.
    pub number_of_pages: Option<i64>,

    /// Pixel dimensions for PNG / baseline JPEG images.
    pub image_dimensions: Option<ImageDimensions>,

    /// Length of decoded text in characters.
    pub text_content_length: Option<i64>,

    /// Number of whitespace-separated words in decoded text.
    pub word_count: Option<i64>,

    /// Set to `office_document` for Office formats.
    pub document_type: Option<String>,

    /// Archive extension (`zip`, `7z`, ...) for archive formats.
    pub archive_type: Option<String>,
}

/// Lifecycle state of a catalog entry.
///
/// Ingestion always writes `Active`; `Deleted` and `Expired` are set by
/// collaborators outside the ingestion path.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Deleted,
    Expired,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Deleted => "deleted",
            RecordStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RecordStatus::Active),
            "deleted" => Ok(RecordStatus::Deleted),
            "expired" => Ok(RecordStatus::Expired),
            other => Err(format!("unknown record status `{}`", other)),
        }
    }
}

/// The persisted catalog entry for one stored object.
///
/// Keyed by `file_id`, which is derived from the object key so that
/// reprocessing the same object overwrites this record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CatalogRecord {
    /// Stable identifier taken from the object key (file name before the first `.`).
    pub file_id: String,

    /// Bucket holding the object.
    pub s3_bucket: String,

    /// Decoded object key within the bucket.
    pub s3_object_key: String,

    /// When the extraction ran.
    pub extracted_at: DateTime<Utc>,

    pub status: RecordStatus,

    /// Payload size in bytes.
    pub file_size: i64,

    /// Declared MIME type (`application/octet-stream` when none was declared).
    pub file_type: String,

    /// Lowercased extension, empty when the file name has none.
    pub file_extension: String,

    #[serde(flatten)]
    pub attributes: ExtractedAttributes,

    pub original_filename: Option<String>,
    pub author_name: Option<String>,
    pub upload_date: Option<String>,
    pub expiration_date: Option<String>,

    /// All user metadata attached to the object at upload time.
    pub object_metadata: BTreeMap<String, String>,
}
