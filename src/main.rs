use anyhow::{Context, Result};
use axum::Router;
use file_catalog::{
    config::{AppConfig, RunMode},
    models::notification::NotificationBatch,
    routes,
    services::{
        catalog_service::CatalogService,
        catalog_store::{self, SqliteCatalogStore},
        object_store::FsObjectStore,
        pipeline::IngestionPipeline,
    },
    state::AppState,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting file-catalog with config: {:?}", cfg);

    // --- Ensure object store root exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let connect_opts = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing database URL `{}`", cfg.database_url))?
        .create_if_missing(true);
    if let Some(parent) = connect_opts.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_opts)
            .await
            .context("connecting to catalog database")?,
    );

    // --- Handle migration mode ---
    if mode == RunMode::Migrate {
        catalog_store::run_migrations(&db, catalog_store::SCHEMA_SQL).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Wire capabilities ---
    let objects = Arc::new(FsObjectStore::new(&cfg.storage_dir));
    let catalog = Arc::new(SqliteCatalogStore::new(db.clone()));
    let pipeline = IngestionPipeline::new(objects, catalog.clone(), cfg.failure_policy);

    if let RunMode::IngestFile(path) = &mode {
        return ingest_file(&pipeline, path).await;
    }

    let state = AppState {
        db,
        storage_dir: cfg.storage_dir.clone().into(),
        pipeline,
        catalog: CatalogService::new(catalog),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// One-shot ingest of a notification batch file; a failed batch is an error
/// exit so the invoking scheduler retries it.
async fn ingest_file(pipeline: &IngestionPipeline, path: &Path) -> Result<()> {
    let raw = fs::read(path).with_context(|| format!("reading event file {}", path.display()))?;
    let batch: NotificationBatch = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing event file {}", path.display()))?;

    let report = pipeline.process_batch(&batch).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.succeeded() {
        anyhow::bail!(
            "batch processing failed ({} of {} record(s) persisted); redeliver to retry",
            report.persisted(),
            report.records.len()
        );
    }
    Ok(())
}
