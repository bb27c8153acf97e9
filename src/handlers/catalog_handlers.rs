//! HTTP handlers for ingestion and catalog lookup.
//!
//! - POST /events              -> run the pipeline over a notification batch
//! - GET  /metadata/{file_id}  -> public metadata for one cataloged file

use crate::{
    errors::AppError,
    models::notification::NotificationBatch,
    services::{catalog_service::FileMetadataView, pipeline::BatchReport},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub message: &'static str,
    pub metadata: FileMetadataView,
}

/// `POST /events`
///
/// Any failed record answers 500 so the sender redelivers the batch. The
/// per-record report is returned either way.
pub async fn ingest_events(
    State(state): State<AppState>,
    Json(batch): Json<NotificationBatch>,
) -> (StatusCode, Json<BatchReport>) {
    let report = state.pipeline.process_batch(&batch).await;
    let status = if report.succeeded() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report))
}

/// `GET /metadata/{file_id}`
pub async fn get_metadata(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Json<MetadataResponse>, AppError> {
    let metadata = state.catalog.lookup(&file_id, Utc::now()).await?;
    Ok(Json(MetadataResponse {
        message: "File metadata retrieved successfully",
        metadata,
    }))
}
