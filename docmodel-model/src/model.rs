//! Runnable models and their instances.

use crate::error::{ModelResult, StoreError};
use crate::query::{Filter, Update, UpdateOptions};
use crate::schema::SchemaRef;
use crate::store::{CollectionHandle, DocumentStore};
use docmodel_types::Document;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A compiled schema bound to a collection in a store.
#[derive(Clone)]
pub struct Model {
    handle: CollectionHandle,
    store: Arc<dyn DocumentStore>,
}

impl Model {
    pub(crate) fn new(handle: CollectionHandle, store: Arc<dyn DocumentStore>) -> Self {
        Self { handle, store }
    }

    /// The collection name this model is bound to.
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn schema(&self) -> &SchemaRef {
        self.handle.schema()
    }

    pub fn handle(&self) -> &CollectionHandle {
        &self.handle
    }

    pub fn primary_key(&self) -> &str {
        self.schema().primary_key()
    }

    /// Constructs an unsaved instance from a JSON object.
    pub fn instance(&self, fields: Value) -> ModelResult<Instance> {
        let doc = Document::from_value(fields).map_err(StoreError::from)?;
        self.new_instance(doc)
    }

    /// Constructs an unsaved instance: defaults, implicit primary key and
    /// strict-mode filtering are applied by the store.
    pub fn new_instance(&self, initial: Document) -> ModelResult<Instance> {
        let doc = self.store.construct(&self.handle, initial)?;
        Ok(Instance {
            model: self.clone(),
            doc,
        })
    }

    /// Wraps a stored document without re-applying defaults.
    pub fn hydrate(&self, doc: Document) -> Instance {
        Instance {
            model: self.clone(),
            doc,
        }
    }

    pub async fn find_by_id(&self, id: &Value) -> ModelResult<Option<Document>> {
        self.find_one(&Filter::eq(self.primary_key(), id.clone())).await
    }

    pub async fn find_one(&self, filter: &Filter) -> ModelResult<Option<Document>> {
        Ok(self.store.find_one(&self.handle, filter).await?)
    }

    pub async fn find(&self, filter: &Filter) -> ModelResult<Vec<Document>> {
        Ok(self.store.find(&self.handle, filter).await?)
    }

    pub async fn find_one_and_update(
        &self,
        filter: &Filter,
        update: &Update,
        options: &UpdateOptions,
    ) -> ModelResult<Option<Document>> {
        Ok(self
            .store
            .find_one_and_update(&self.handle, filter, update, options)
            .await?)
    }

    pub async fn delete_many(&self, filter: &Filter) -> ModelResult<u64> {
        Ok(self.store.delete_many(&self.handle, filter).await?)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model").field("handle", &self.handle).finish()
    }
}

/// A document bound to its model.
#[derive(Clone)]
pub struct Instance {
    model: Model,
    doc: Document,
}

impl Instance {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn primary_key(&self) -> &str {
        self.model.primary_key()
    }

    pub fn primary_key_value(&self) -> Option<&Value> {
        self.doc.get(self.primary_key())
    }

    /// Reads a stored field, falling back to a bound virtual.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.doc
            .get(field)
            .cloned()
            .or_else(|| self.model.schema().resolve_virtual(field, &self.doc))
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.doc.set(field, value);
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub async fn validate(&mut self) -> ModelResult<()> {
        Ok(self
            .model
            .store
            .validate(&self.model.handle, &mut self.doc)
            .await?)
    }

    pub async fn save(&mut self) -> ModelResult<()> {
        Ok(self.model.store.save(&self.model.handle, &mut self.doc).await?)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("model", &self.model.name())
            .field("doc", &self.doc)
            .finish()
    }
}
