//! Shared state handed to every HTTP handler.

use crate::services::{catalog_service::CatalogService, pipeline::IngestionPipeline};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

#[derive(Clone)]
pub struct AppState {
    /// Catalog database, also probed by `/readyz`.
    pub db: Arc<SqlitePool>,

    /// Object store root, probed by `/readyz`.
    pub storage_dir: PathBuf,

    pub pipeline: IngestionPipeline,
    pub catalog: CatalogService,
}
