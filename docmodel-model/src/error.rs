//! Error types for the model layer.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while declaring, building or using a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A required declaration or argument is missing or invalid.
    /// Fatal: the build or call is aborted and never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A hook event name does not decode to a known lifecycle point.
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// The underlying document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A hook event name could not be translated to a middleware point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("{instruction} is not a valid middleware instruction when using {event}")]
    InvalidInstruction { instruction: String, event: String },

    #[error("{command} is not a valid middleware command when using {event}")]
    InvalidCommand { command: String, event: String },
}

/// Errors surfaced by a [`DocumentStore`](crate::DocumentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A collection with this name is already bound.
    #[error("collection already bound: {0}")]
    DuplicateCollection(String),

    /// No collection with this name is bound.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// A document failed schema validation.
    #[error("validation failed for {collection}: {message}")]
    Validation { collection: String, message: String },

    /// A write would violate a unique index.
    #[error("duplicate key in {collection} for index {index}")]
    DuplicateKey { collection: String, index: String },

    /// A lifecycle hook signalled failure.
    #[error("hook failed: {0}")]
    Hook(#[from] HookError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure (connectivity, I/O).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failure reported by a lifecycle hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// The hook ran and reported failure.
    #[error("{0}")]
    Failed(String),

    /// A `"Group.method"` reference named a group the registry does not know.
    #[error("hook group not registered: {group}")]
    UnknownGroup { group: String },

    /// The group exists but has no such method.
    #[error("hook group {group} has no method {method}")]
    UnknownMethod { group: String, method: String },

    /// The handler string is not of the form `"Group.method"`.
    #[error("malformed hook reference: {0}")]
    MalformedReference(String),
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self::Failed(message)
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::Failed(message.to_string())
    }
}

impl From<docmodel_types::Error> for StoreError {
    fn from(err: docmodel_types::Error) -> Self {
        match err {
            docmodel_types::Error::Serialization(e) => Self::Serialization(e),
            other => Self::Backend(other.to_string()),
        }
    }
}
