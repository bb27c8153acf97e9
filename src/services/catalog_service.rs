//! src/services/catalog_service.rs
//!
//! Read path over the catalog: resolves a file id to its public metadata
//! view, refusing ids that are malformed, missing, no longer active, or past
//! their expiration date.

use crate::{
    models::record::{CatalogRecord, RecordStatus},
    services::catalog_store::{CatalogError, CatalogStore},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Length of the hyphenated UUID form; other forms `Uuid` accepts are refused.
const HYPHENATED_UUID_LEN: usize = 36;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Invalid file_id format. Must be a valid UUID.")]
    InvalidFileId,
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("File {file_id} is no longer available (status: {status})")]
    Unavailable {
        file_id: String,
        status: RecordStatus,
    },
    #[error("File {file_id} has expired ({expiration_date})")]
    Expired {
        file_id: String,
        expiration_date: String,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Fields exposed to callers; storage locations are withheld.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileMetadataView {
    pub file_id: String,
    pub original_filename: Option<String>,
    pub file_size: i64,
    pub mime_type: String,
    pub author_name: Option<String>,
    pub expiration_date: Option<String>,
    pub upload_date: Option<String>,
    pub status: RecordStatus,
}

impl From<CatalogRecord> for FileMetadataView {
    fn from(record: CatalogRecord) -> Self {
        Self {
            file_id: record.file_id,
            original_filename: record.original_filename,
            file_size: record.file_size,
            mime_type: record.file_type,
            author_name: record.author_name,
            expiration_date: record.expiration_date,
            upload_date: record.upload_date,
            status: record.status,
        }
    }
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn lookup(
        &self,
        file_id: &str,
        now: DateTime<Utc>,
    ) -> Result<FileMetadataView, LookupError> {
        if file_id.len() != HYPHENATED_UUID_LEN || Uuid::try_parse(file_id).is_err() {
            return Err(LookupError::InvalidFileId);
        }

        let record = self
            .store
            .get(file_id)
            .await?
            .ok_or_else(|| LookupError::NotFound(file_id.to_string()))?;

        if record.status != RecordStatus::Active {
            return Err(LookupError::Unavailable {
                file_id: record.file_id,
                status: record.status,
            });
        }

        // unparsable dates never expire
        if let Some(expiration) = record.expiration_date.as_deref() {
            if parse_expiration(expiration).is_some_and(|at| at <= now) {
                return Err(LookupError::Expired {
                    file_id: record.file_id.clone(),
                    expiration_date: expiration.to_string(),
                });
            }
        }

        Ok(record.into())
    }
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` date taken as UTC midnight.
fn parse_expiration(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}
