//! File introspection: bounds-checked decoders that pull a few structural
//! facts out of untrusted payloads, plus the record builder that runs them.

pub mod builder;
pub mod cursor;
pub mod dispatch;
pub mod jpeg;
pub mod pdf;
pub mod png;
pub mod text;

pub use builder::build_record;
