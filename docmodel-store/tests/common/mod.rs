//! Shared fixtures for store tests.

#![allow(dead_code)]

use docmodel_model::{
    Boot, FieldDef, Fields, IndexOptions, IndexSpec, Model, ModelBuilder, ModelDefinition,
    ModelResult,
};
use docmodel_store::MemoryStore;
use std::sync::Arc;

pub struct User;

impl ModelDefinition for User {
    fn schema() -> Option<Fields> {
        Some(
            Fields::new()
                .field("email", FieldDef::string().required())
                .field("username", FieldDef::string())
                .field("password", FieldDef::string())
                .field("age", FieldDef::integer())
                .field("role", FieldDef::string().default_value("member")),
        )
    }

    fn boot(boot: &Boot<'_>) -> ModelResult<()> {
        boot.index(IndexSpec::ascending("email"), Some(IndexOptions::unique()));
        Ok(())
    }
}

pub struct Post;

impl ModelDefinition for Post {
    fn schema() -> Option<Fields> {
        Some(
            Fields::new()
                .field("title", FieldDef::string().required())
                .field("author", FieldDef::id().reference("User")),
        )
    }

    fn timestamps() -> bool {
        false
    }
}

pub fn builder() -> (Arc<MemoryStore>, ModelBuilder) {
    let store = Arc::new(MemoryStore::new());
    let builder = ModelBuilder::new(store.clone());
    (store, builder)
}

pub fn users_and_posts() -> (Arc<MemoryStore>, ModelBuilder, Model, Model) {
    let (store, builder) = builder();
    let users = builder.build::<User>("User").unwrap();
    let posts = builder.build::<Post>("Post").unwrap();
    (store, builder, users, posts)
}
