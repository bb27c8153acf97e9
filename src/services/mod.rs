//! Store adapters, the ingestion pipeline, and the catalog read path.

pub mod catalog_service;
pub mod catalog_store;
pub mod object_store;
pub mod pipeline;
