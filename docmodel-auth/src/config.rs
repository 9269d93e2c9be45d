//! Serializer configuration.

use crate::token::TokenModel;
use docmodel_model::Model;
use serde::{Deserialize, Serialize};

/// Names of the credential fields on the subject model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialFields {
    /// Field holding the password hash.
    pub password: String,
    /// Alternate lookup field (e.g. `email`). Falls back to the model's
    /// primary key.
    pub uid: Option<String>,
}

impl Default for CredentialFields {
    fn default() -> Self {
        Self {
            password: "password".to_string(),
            uid: None,
        }
    }
}

/// Everything a [`Serializer`](crate::Serializer) needs: the subject model,
/// the token model and the credential field names.
#[derive(Debug, Clone)]
pub struct SerializerConfig {
    pub model: Model,
    pub token: TokenModel,
    pub fields: CredentialFields,
}

impl SerializerConfig {
    pub fn new(model: Model, token: TokenModel) -> Self {
        Self {
            model,
            token,
            fields: CredentialFields::default(),
        }
    }

    pub fn with_fields(mut self, fields: CredentialFields) -> Self {
        self.fields = fields;
        self
    }

    /// The field used by `find_by_uid`.
    pub fn uid_field(&self) -> &str {
        self.fields
            .uid
            .as_deref()
            .unwrap_or_else(|| self.model.primary_key())
    }
}
