//! Error types for the auth layer.

use docmodel_model::{ModelError, StoreError};
use thiserror::Error;

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur in the serializer and token model.
#[derive(Debug, Error)]
pub enum AuthError {
    /// An operation was called before `set_config`.
    #[error("serializer is not configured: call set_config first")]
    NotConfigured,

    /// A subject document carries no value for its primary key.
    #[error("subject has no value for primary key `{0}`")]
    MissingPrimaryKey(String),

    /// Model build or store failure.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A stored record did not match its expected shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Model(ModelError::Store(err))
    }
}

impl From<docmodel_types::Error> for AuthError {
    fn from(err: docmodel_types::Error) -> Self {
        match err {
            docmodel_types::Error::Serialization(e) => Self::Serialization(e),
            other => Self::Model(ModelError::Store(other.into())),
        }
    }
}
