//! src/services/catalog_store.rs
//!
//! Catalog persistence. `CatalogStore` is the capability the pipeline writes
//! through; `SqliteCatalogStore` keeps one row per `file_id` and upserts on
//! every write so redelivered notifications overwrite rather than duplicate.

use crate::models::record::{CatalogRecord, ExtractedAttributes, ImageDimensions, RecordStatus};
use chrono::{DateTime, Utc};
use futures::{FutureExt, future::BoxFuture};
use sqlx::{FromRow, SqlitePool, types::Json};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error;
use tracing::debug;

/// Schema applied by `--migrate` and by tests.
pub const SCHEMA_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("stored record `{file_id}` is corrupt: {reason}")]
    Corrupt { file_id: String, reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog key-value capability keyed by `file_id`.
pub trait CatalogStore: Send + Sync {
    /// Insert or overwrite the record stored under `record.file_id`.
    fn upsert<'a>(&'a self, record: &'a CatalogRecord) -> BoxFuture<'a, CatalogResult<()>>;

    fn get<'a>(&'a self, file_id: &'a str) -> BoxFuture<'a, CatalogResult<Option<CatalogRecord>>>;
}

#[derive(Clone)]
pub struct SqliteCatalogStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

/// Flat row shape of `catalog_records`.
#[derive(FromRow, Debug)]
struct CatalogRow {
    file_id: String,
    s3_bucket: String,
    s3_object_key: String,
    extracted_at: DateTime<Utc>,
    status: String,
    file_size: i64,
    file_type: String,
    file_extension: String,
    number_of_pages: Option<i64>,
    image_width: Option<i64>,
    image_height: Option<i64>,
    text_content_length: Option<i64>,
    word_count: Option<i64>,
    document_type: Option<String>,
    archive_type: Option<String>,
    original_filename: Option<String>,
    author_name: Option<String>,
    upload_date: Option<String>,
    expiration_date: Option<String>,
    object_metadata: Json<BTreeMap<String, String>>,
}

impl TryFrom<CatalogRow> for CatalogRecord {
    type Error = CatalogError;

    fn try_from(row: CatalogRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| CatalogError::Corrupt {
            file_id: row.file_id.clone(),
            reason,
        };

        let status = row.status.parse::<RecordStatus>().map_err(&corrupt)?;
        let image_dimensions = match (row.image_width, row.image_height) {
            (Some(w), Some(h)) => Some(ImageDimensions {
                width: u32::try_from(w).map_err(|e| corrupt(format!("image_width: {}", e)))?,
                height: u32::try_from(h).map_err(|e| corrupt(format!("image_height: {}", e)))?,
            }),
            _ => None,
        };

        Ok(CatalogRecord {
            file_id: row.file_id.clone(),
            s3_bucket: row.s3_bucket,
            s3_object_key: row.s3_object_key,
            extracted_at: row.extracted_at,
            status,
            file_size: row.file_size,
            file_type: row.file_type,
            file_extension: row.file_extension,
            attributes: ExtractedAttributes {
                number_of_pages: row.number_of_pages,
                image_dimensions,
                text_content_length: row.text_content_length,
                word_count: row.word_count,
                document_type: row.document_type,
                archive_type: row.archive_type,
            },
            original_filename: row.original_filename,
            author_name: row.author_name,
            upload_date: row.upload_date,
            expiration_date: row.expiration_date,
            object_metadata: row.object_metadata.0,
        })
    }
}

impl SqliteCatalogStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    async fn upsert_record(&self, record: &CatalogRecord) -> CatalogResult<()> {
        let attrs = &record.attributes;
        let dims = attrs.image_dimensions;

        sqlx::query(
            r#"
            INSERT INTO catalog_records (
                file_id, s3_bucket, s3_object_key, extracted_at, status,
                file_size, file_type, file_extension, number_of_pages,
                image_width, image_height, text_content_length, word_count,
                document_type, archive_type, original_filename, author_name,
                upload_date, expiration_date, object_metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_id) DO UPDATE SET
                s3_bucket = excluded.s3_bucket,
                s3_object_key = excluded.s3_object_key,
                extracted_at = excluded.extracted_at,
                status = excluded.status,
                file_size = excluded.file_size,
                file_type = excluded.file_type,
                file_extension = excluded.file_extension,
                number_of_pages = excluded.number_of_pages,
                image_width = excluded.image_width,
                image_height = excluded.image_height,
                text_content_length = excluded.text_content_length,
                word_count = excluded.word_count,
                document_type = excluded.document_type,
                archive_type = excluded.archive_type,
                original_filename = excluded.original_filename,
                author_name = excluded.author_name,
                upload_date = excluded.upload_date,
                expiration_date = excluded.expiration_date,
                object_metadata = excluded.object_metadata
            "#,
        )
        .bind(&record.file_id)
        .bind(&record.s3_bucket)
        .bind(&record.s3_object_key)
        .bind(record.extracted_at)
        .bind(record.status.as_str())
        .bind(record.file_size)
        .bind(&record.file_type)
        .bind(&record.file_extension)
        .bind(attrs.number_of_pages)
        .bind(dims.map(|d| i64::from(d.width)))
        .bind(dims.map(|d| i64::from(d.height)))
        .bind(attrs.text_content_length)
        .bind(attrs.word_count)
        .bind(attrs.document_type.as_deref())
        .bind(attrs.archive_type.as_deref())
        .bind(record.original_filename.as_deref())
        .bind(record.author_name.as_deref())
        .bind(record.upload_date.as_deref())
        .bind(record.expiration_date.as_deref())
        .bind(Json(&record.object_metadata))
        .execute(&*self.db)
        .await?;

        debug!("upserted catalog record {}", record.file_id);
        Ok(())
    }

    async fn fetch_record(&self, file_id: &str) -> CatalogResult<Option<CatalogRecord>> {
        let row = sqlx::query_as::<_, CatalogRow>(
            "SELECT file_id, s3_bucket, s3_object_key, extracted_at, status,
                    file_size, file_type, file_extension, number_of_pages,
                    image_width, image_height, text_content_length, word_count,
                    document_type, archive_type, original_filename, author_name,
                    upload_date, expiration_date, object_metadata
             FROM catalog_records WHERE file_id = ?",
        )
        .bind(file_id)
        .fetch_optional(&*self.db)
        .await?;

        row.map(CatalogRecord::try_from).transpose()
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn upsert<'a>(&'a self, record: &'a CatalogRecord) -> BoxFuture<'a, CatalogResult<()>> {
        self.upsert_record(record).boxed()
    }

    fn get<'a>(&'a self, file_id: &'a str) -> BoxFuture<'a, CatalogResult<Option<CatalogRecord>>> {
        self.fetch_record(file_id).boxed()
    }
}

/// Apply a `;`-separated schema script one statement at a time.
pub async fn run_migrations(db: &SqlitePool, sql: &str) -> CatalogResult<usize> {
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in &statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(statements.len())
}
