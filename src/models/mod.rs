//! Core data models for the file catalog.
//!
//! `record` holds the persisted catalog entity, `notification` the inbound
//! change-event batch, and `content` the per-invocation file payload.

pub mod content;
pub mod notification;
pub mod record;
