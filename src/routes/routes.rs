//! Defines the HTTP surface of the catalog service.
//!
//! - `GET  /healthz`, `GET /readyz` — probes
//! - `POST /events` — storage-change notification batch to ingest
//! - `GET  /metadata/{file_id}` — catalog lookup

use crate::{
    handlers::{
        catalog_handlers::{get_metadata, ingest_events},
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router; the caller attaches `AppState` with `with_state`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/events", post(ingest_events))
        .route("/metadata/{file_id}", get(get_metadata))
}
