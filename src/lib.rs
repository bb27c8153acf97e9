//! File catalog: ingests objects named by storage-change notifications,
//! extracts structural facts from their bytes, and persists one catalog
//! record per file.

pub mod config;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
