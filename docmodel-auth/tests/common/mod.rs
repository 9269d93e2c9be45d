//! Shared fixtures for auth tests.

#![allow(dead_code)]

use async_trait::async_trait;
use docmodel_auth::{
    DefaultToken, PasswordVerifier, Serializer, SerializerConfig, TokenDefinition, TokenModel,
};
use docmodel_model::{FieldDef, Fields, Instance, Model, ModelBuilder, ModelDefinition};
use docmodel_store::MemoryStore;
use docmodel_types::Document;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct User;

impl ModelDefinition for User {
    fn schema() -> Option<Fields> {
        Some(
            Fields::new()
                .field("email", FieldDef::string().required())
                .field("name", FieldDef::string())
                .field("password", FieldDef::string())
                .field("active", FieldDef::boolean().default_value(true)),
        )
    }
}

/// Joins only the email for every token type.
pub struct EmailToken;

impl TokenDefinition for EmailToken {
    fn subject_fields(_kind: &str) -> Option<Vec<String>> {
        Some(vec!["email".to_string()])
    }
}

/// Plain-text verifier that counts its calls.
#[derive(Default)]
pub struct CountingVerifier {
    calls: AtomicUsize,
}

impl CountingVerifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PasswordVerifier for CountingVerifier {
    async fn verify(&self, password: &str, hash: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        password == hash
    }
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub builder: ModelBuilder,
    pub users: Model,
    pub tokens: TokenModel,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_token::<DefaultToken>()
    }

    pub fn with_token<T: TokenDefinition>() -> Self {
        let store = Arc::new(MemoryStore::new());
        let builder = ModelBuilder::new(store.clone());
        let users = builder.build::<User>("User").unwrap();
        let tokens = TokenModel::build::<T>(&builder, "Token").unwrap();
        Self {
            store,
            builder,
            users,
            tokens,
        }
    }

    pub async fn user(&self, email: &str, password: &str) -> Instance {
        let mut user = self
            .users
            .instance(json!({"email": email, "name": "Test", "password": password}))
            .unwrap();
        user.save().await.unwrap();
        user
    }

    pub fn serializer(&self, verifier: Arc<dyn PasswordVerifier>) -> Serializer {
        let mut serializer = Serializer::new(verifier);
        serializer.set_config(SerializerConfig::new(self.users.clone(), self.tokens.clone()));
        serializer
    }
}

pub fn doc(value: serde_json::Value) -> Document {
    Document::from_value(value).unwrap()
}
