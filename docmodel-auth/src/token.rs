//! The session token model.

use crate::error::AuthResult;
use docmodel_model::{
    Boot, DEFAULT_PRIMARY_KEY, FieldDef, Fields, Filter, IndexSpec, Model, ModelBuilder,
    ModelDefinition, ModelResult, Populate, Update, UpdateOptions,
};
use docmodel_types::{Document, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// Subject reference field.
pub const UID: &str = "uid";
/// Token value field.
pub const TOKEN: &str = "token";
/// Token class field (remember-me, api, ...).
pub const TYPE: &str = "type";
/// Expiry field, in milliseconds since the epoch.
pub const EXPIRES: &str = "expires";

/// Per-application token settings.
///
/// ```
/// use docmodel_auth::TokenDefinition;
///
/// struct ApiToken;
///
/// impl TokenDefinition for ApiToken {
///     fn expires_in_days() -> i64 {
///         30
///     }
///
///     fn subject_fields(_kind: &str) -> Option<Vec<String>> {
///         Some(vec!["email".into()])
///     }
/// }
/// ```
pub trait TokenDefinition: Send + Sync + 'static {
    /// Length of the sliding expiry window.
    fn expires_in_days() -> i64 {
        5
    }

    /// Name of the collection tokens reference.
    fn subject_model() -> &'static str {
        "User"
    }

    /// Primary key of the referenced model.
    fn subject_primary_key() -> &'static str {
        DEFAULT_PRIMARY_KEY
    }

    /// Subject fields joined into a session for tokens of `kind`. `None`
    /// joins every field; the primary key is always kept.
    fn subject_fields(kind: &str) -> Option<Vec<String>> {
        let _ = kind;
        None
    }
}

/// Token settings used when nothing is overridden.
pub struct DefaultToken;

impl TokenDefinition for DefaultToken {}

/// The token model declaration, parameterised by its settings.
pub struct Token<T = DefaultToken>(PhantomData<fn() -> T>);

fn default_expiry<T: TokenDefinition>() -> Value {
    Timestamp::now_add_days(T::expires_in_days()).into()
}

impl<T: TokenDefinition> ModelDefinition for Token<T> {
    fn schema() -> Option<Fields> {
        Some(
            Fields::new()
                .field(UID, FieldDef::id().reference(T::subject_model()))
                .field(TOKEN, FieldDef::string().required())
                .field(TYPE, FieldDef::string().required())
                .field(EXPIRES, FieldDef::date().default_with(default_expiry::<T>)),
        )
    }

    fn timestamps() -> bool {
        false
    }

    fn boot(boot: &Boot<'_>) -> ModelResult<()> {
        boot.index(IndexSpec::ascending(TOKEN), None);
        Ok(())
    }
}

/// A stored token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: Value,
    pub uid: Value,
    pub token: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub expires: Timestamp,
}

impl TokenRecord {
    pub fn is_expired_at(&self, at: Timestamp) -> bool {
        self.expires.is_before(&at)
    }
}

/// A live token with its joined subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The refreshed token; `uid` holds the subject's primary key.
    pub token: TokenRecord,
    /// The subject's selected fields, or `None` if it no longer exists.
    pub subject: Option<Document>,
}

/// A built token model.
#[derive(Clone)]
pub struct TokenModel {
    model: Model,
    expires_in_days: i64,
    subject_primary_key: &'static str,
    subject_fields: fn(&str) -> Option<Vec<String>>,
}

impl TokenModel {
    /// Builds `Token<T>` and binds it to the collection `name`.
    pub fn build<T: TokenDefinition>(builder: &ModelBuilder, name: &str) -> ModelResult<Self> {
        let model = builder.build::<Token<T>>(name)?;
        Ok(Self {
            model,
            expires_in_days: T::expires_in_days(),
            subject_primary_key: T::subject_primary_key(),
            subject_fields: T::subject_fields,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn expires_in_days(&self) -> i64 {
        self.expires_in_days
    }

    /// Creates and saves a token for the subject `uid`.
    pub async fn issue(&self, uid: Value, token: &str, kind: &str) -> AuthResult<TokenRecord> {
        let initial: Document = [
            (UID, uid),
            (TOKEN, Value::from(token)),
            (TYPE, Value::from(kind)),
        ]
        .into_iter()
        .collect();
        let mut instance = self.model.new_instance(initial)?;
        instance.save().await?;
        Ok(instance.document().to_typed()?)
    }

    /// Finds the unexpired `(token, kind)` record, pushes its expiry out to
    /// now + window and joins the subject, all in one store operation.
    pub async fn fetch_session(&self, token: &str, kind: &str) -> AuthResult<Option<Session>> {
        let now = Timestamp::now();
        let filter = Filter::eq(TOKEN, token)
            .and(Filter::eq(TYPE, kind))
            .and(Filter::gte(EXPIRES, now));
        let update = Update::set(EXPIRES, now.add_days(self.expires_in_days));
        let options = UpdateOptions {
            populate: Some(Populate::new(UID).select((self.subject_fields)(kind))),
            ..UpdateOptions::default()
        };

        let Some(mut doc) = self
            .model
            .find_one_and_update(&filter, &update, &options)
            .await?
        else {
            debug!("No live {} token matched", kind);
            return Ok(None);
        };

        let subject = match doc.remove(UID) {
            Some(Value::Object(map)) => Some(Document::from(map)),
            _ => None,
        };
        let subject_id = subject
            .as_ref()
            .and_then(|s| s.get(self.subject_primary_key).cloned())
            .unwrap_or(Value::Null);
        doc.set(UID, subject_id);

        Ok(Some(Session {
            token: doc.to_typed()?,
            subject,
        }))
    }

    /// Deletes tokens of the subject `uid`.
    ///
    /// - `tokens == None`: every token of the subject
    /// - `inverse == false`: exactly the listed tokens
    /// - `inverse == true`: every token except the listed ones
    pub async fn dispose(&self, uid: &Value, tokens: Option<&[String]>, inverse: bool) -> AuthResult<u64> {
        let owner = Filter::eq(UID, uid.clone());
        let filter = match tokens {
            None => owner,
            Some([]) if !inverse => return Ok(0),
            Some(list) if inverse => owner.and(Filter::not_in(TOKEN, list.iter().map(String::as_str))),
            Some(list) => owner.and(Filter::is_in(TOKEN, list.iter().map(String::as_str))),
        };
        Ok(self.model.delete_many(&filter).await?)
    }

    /// Every stored token of `kind` for the subject `uid`.
    pub async fn list(&self, uid: &Value, kind: &str) -> AuthResult<Vec<TokenRecord>> {
        let filter = Filter::eq(UID, uid.clone()).and(Filter::eq(TYPE, kind));
        self.model
            .find(&filter)
            .await?
            .iter()
            .map(|doc| -> AuthResult<TokenRecord> { Ok(doc.to_typed()?) })
            .collect()
    }
}

impl fmt::Debug for TokenModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenModel")
            .field("model", &self.model.name())
            .field("expires_in_days", &self.expires_in_days)
            .finish()
    }
}
