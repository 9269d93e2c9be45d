//! Credential and session lookup over a configured subject model.

use crate::config::SerializerConfig;
use crate::error::{AuthError, AuthResult};
use crate::token::TokenRecord;
use crate::verifier::PasswordVerifier;
use docmodel_model::Filter;
use docmodel_types::Document;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Authenticates subjects and manages their tokens.
///
/// A serializer starts unconfigured; every operation other than
/// [`set_config`](Self::set_config) fails with [`AuthError::NotConfigured`]
/// until a configuration is set. Lookup misses are `Ok(None)`.
pub struct Serializer {
    verifier: Arc<dyn PasswordVerifier>,
    config: Option<SerializerConfig>,
    constraint: Option<Filter>,
}

impl Serializer {
    pub fn new(verifier: Arc<dyn PasswordVerifier>) -> Self {
        Self {
            verifier,
            config: None,
            constraint: None,
        }
    }

    /// Binds the subject model, token model and credential fields.
    /// Replaces any earlier configuration.
    pub fn set_config(&mut self, config: SerializerConfig) {
        debug!(
            "Serializer configured for {} with tokens in {}",
            config.model.name(),
            config.token.model().name()
        );
        self.config = Some(config);
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> AuthResult<&SerializerConfig> {
        self.config.as_ref().ok_or(AuthError::NotConfigured)
    }

    /// Adds a condition every subject lookup must also satisfy
    /// (e.g. `active == true`).
    pub fn query(&mut self, constraint: Filter) -> &mut Self {
        self.constraint = Some(constraint);
        self
    }

    fn constrained(&self, filter: Filter) -> Filter {
        match &self.constraint {
            Some(extra) => filter.and(extra.clone()),
            None => filter,
        }
    }

    /// The subject model's primary key.
    pub fn primary_key(&self) -> AuthResult<&str> {
        Ok(self.config()?.model.primary_key())
    }

    fn primary_key_value(&self, user: &Document) -> AuthResult<Value> {
        let pk = self.primary_key()?;
        user.get(pk)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| AuthError::MissingPrimaryKey(pk.to_string()))
    }

    /// Looks a subject up by primary key.
    pub async fn find_by_id(&self, id: &Value) -> AuthResult<Option<Document>> {
        let config = self.config()?;
        debug!("Finding user with primary key as {}", id);
        let filter = self.constrained(Filter::eq(config.model.primary_key(), id.clone()));
        Ok(config.model.find_one(&filter).await?)
    }

    /// Looks a subject up by the configured uid field.
    pub async fn find_by_uid(&self, uid: &Value) -> AuthResult<Option<Document>> {
        let config = self.config()?;
        debug!("Finding user with {} as {}", config.uid_field(), uid);
        let filter = self.constrained(Filter::eq(config.uid_field(), uid.clone()));
        Ok(config.model.find_one(&filter).await?)
    }

    /// Checks `password` against the subject's stored hash. A missing
    /// subject or hash is `false` and the verifier is not consulted.
    pub async fn validate_credentials(&self, user: Option<&Document>, password: &str) -> AuthResult<bool> {
        let config = self.config()?;
        let Some(hash) = user
            .and_then(|u| u.get_str(&config.fields.password))
            .filter(|h| !h.is_empty())
        else {
            return Ok(false);
        };
        Ok(self.verifier.verify(password, hash).await)
    }

    /// Resolves a token to its subject, refreshing the token's expiry.
    /// An empty or absent token returns `None` without a store round trip.
    pub async fn find_by_token(&self, token: Option<&str>, kind: &str) -> AuthResult<Option<Document>> {
        let config = self.config()?;
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        debug!("Finding user for {} token", kind);
        let session = config.token.fetch_session(token, kind).await?;
        Ok(session.and_then(|s| s.subject))
    }

    /// Stores a new token for `user`.
    pub async fn save_token(&self, user: &Document, token: &str, kind: &str) -> AuthResult<TokenRecord> {
        let config = self.config()?;
        let uid = self.primary_key_value(user)?;
        debug!("Saving {} token for {} user", kind, uid);
        config.token.issue(uid, token, kind).await
    }

    /// Same as [`delete_tokens`](Self::delete_tokens).
    pub async fn revoke_tokens(&self, user: &Document, tokens: Option<&[String]>, inverse: bool) -> AuthResult<u64> {
        self.delete_tokens(user, tokens, inverse).await
    }

    /// Deletes all of `user`'s tokens, only the listed ones, or (with
    /// `inverse`) all but the listed ones. Returns how many were deleted.
    pub async fn delete_tokens(&self, user: &Document, tokens: Option<&[String]>, inverse: bool) -> AuthResult<u64> {
        let config = self.config()?;
        let uid = self.primary_key_value(user)?;
        match tokens {
            Some(list) => debug!("Revoking {:?} tokens for {} user (inverse: {})", list, uid, inverse),
            None => debug!("Revoking all tokens for {} user", uid),
        }
        config.token.dispose(&uid, tokens, inverse).await
    }

    /// Every stored token of `kind` for `user`.
    pub async fn list_tokens(&self, user: &Document, kind: &str) -> AuthResult<Vec<TokenRecord>> {
        let config = self.config()?;
        let uid = self.primary_key_value(user)?;
        config.token.list(&uid, kind).await
    }
}
