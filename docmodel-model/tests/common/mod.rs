//! Shared test helpers for model tests.

#![allow(dead_code)]

use async_trait::async_trait;
use docmodel_model::hooks::run_middleware;
use docmodel_model::{
    CollectionHandle, Command, DocumentStore, Filter, Instruction, SchemaRef, StoreError,
    StoreResult, Update, UpdateOptions,
};
use docmodel_types::Document;
use std::collections::HashSet;
use std::sync::Mutex;

/// A store that only records bindings and runs validate middleware.
/// Reads and writes are not supported.
#[derive(Default)]
pub struct RecordingStore {
    bound: Mutex<HashSet<String>>,
}

impl RecordingStore {
    pub fn bound_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bound.lock().unwrap().iter().cloned().collect();
        names.sort();
        names
    }
}

fn unsupported<T>() -> StoreResult<T> {
    Err(StoreError::Backend("not supported by RecordingStore".into()))
}

#[async_trait]
impl DocumentStore for RecordingStore {
    fn bind(&self, name: &str, schema: SchemaRef) -> StoreResult<CollectionHandle> {
        if !self.bound.lock().unwrap().insert(name.to_string()) {
            return Err(StoreError::DuplicateCollection(name.to_string()));
        }
        Ok(CollectionHandle::new(name, schema))
    }

    fn construct(&self, _handle: &CollectionHandle, initial: Document) -> StoreResult<Document> {
        Ok(initial)
    }

    async fn validate(&self, handle: &CollectionHandle, doc: &mut Document) -> StoreResult<()> {
        let schema = handle.schema();
        run_middleware(&schema.middleware_for(Instruction::Pre, Command::Validate), doc).await?;
        run_middleware(&schema.middleware_for(Instruction::Post, Command::Validate), doc).await?;
        Ok(())
    }

    async fn save(&self, _handle: &CollectionHandle, _doc: &mut Document) -> StoreResult<()> {
        unsupported()
    }

    async fn find_one(&self, _handle: &CollectionHandle, _filter: &Filter) -> StoreResult<Option<Document>> {
        unsupported()
    }

    async fn find(&self, _handle: &CollectionHandle, _filter: &Filter) -> StoreResult<Vec<Document>> {
        unsupported()
    }

    async fn find_one_and_update(
        &self,
        _handle: &CollectionHandle,
        _filter: &Filter,
        _update: &Update,
        _options: &UpdateOptions,
    ) -> StoreResult<Option<Document>> {
        unsupported()
    }

    async fn delete_many(&self, _handle: &CollectionHandle, _filter: &Filter) -> StoreResult<u64> {
        unsupported()
    }
}
