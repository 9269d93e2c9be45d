//! Core type definitions for docmodel.
//!
//! This crate defines the store-agnostic types shared by every other crate:
//! - Generated document keys (UUID v7)
//! - Millisecond timestamps with day arithmetic
//! - [`Document`], the JSON record passed between models, hooks and stores
//!
//! Nothing here knows about schemas or lifecycle hooks; those belong to
//! `docmodel-model`.

mod document;
mod ids;
mod timestamp;

pub use document::Document;
pub use ids::DocumentId;
pub use timestamp::{Timestamp, MILLIS_PER_DAY};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),
}
