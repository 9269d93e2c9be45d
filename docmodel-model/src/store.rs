//! The document store capability consumed by models.
//!
//! The model layer owns no persistence. A store binds compiled schemas to
//! named collections and performs CRUD on them, firing the middleware
//! registered on each schema.

use crate::error::StoreResult;
use crate::query::{Filter, Update, UpdateOptions};
use crate::schema::SchemaRef;
use async_trait::async_trait;
use docmodel_types::Document;
use std::fmt;

/// A compiled schema bound to a named collection.
#[derive(Clone)]
pub struct CollectionHandle {
    name: String,
    schema: SchemaRef,
}

impl CollectionHandle {
    pub fn new(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }
}

impl fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.name)
            .field("model", &self.schema.model_name())
            .finish()
    }
}

/// Abstract document store.
///
/// Index and middleware registration live on the compiled schema itself
/// (see [`CompiledSchema`](crate::CompiledSchema)); a store reads them from
/// the handle's schema.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Binds a schema to a collection name. Binding a name twice is an error.
    fn bind(&self, name: &str, schema: SchemaRef) -> StoreResult<CollectionHandle>;

    /// Builds a new, unsaved document: applies defaults, generates an
    /// implicit primary key and drops undeclared fields in strict mode.
    fn construct(&self, handle: &CollectionHandle, initial: Document) -> StoreResult<Document>;

    /// Runs validation middleware and schema checks.
    async fn validate(&self, handle: &CollectionHandle, doc: &mut Document) -> StoreResult<()>;

    /// Validates and writes a document, inserting or replacing by primary key.
    async fn save(&self, handle: &CollectionHandle, doc: &mut Document) -> StoreResult<()>;

    async fn find_one(&self, handle: &CollectionHandle, filter: &Filter) -> StoreResult<Option<Document>>;

    async fn find(&self, handle: &CollectionHandle, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Finds one matching document and applies `update` to it as a single
    /// atomic step.
    async fn find_one_and_update(
        &self,
        handle: &CollectionHandle,
        filter: &Filter,
        update: &Update,
        options: &UpdateOptions,
    ) -> StoreResult<Option<Document>>;

    /// Deletes every matching document, returning how many were removed.
    async fn delete_many(&self, handle: &CollectionHandle, filter: &Filter) -> StoreResult<u64>;
}
