//! In-process document store.
//!
//! Collections are plain vectors guarded by a mutex. Lifecycle middleware
//! never runs while a collection lock is held.

use crate::config::StoreConfig;
use async_trait::async_trait;
use docmodel_model::hooks::run_middleware;
use docmodel_model::{
    CollectionHandle, Command, DocumentStore, FieldType, Filter, Instruction, Populate, SchemaRef,
    StoreError, StoreResult, Update, UpdateOptions,
};
use docmodel_types::{Document, DocumentId, Timestamp};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

struct Collection {
    name: String,
    schema: SchemaRef,
    docs: Mutex<Vec<Document>>,
}

impl Collection {
    fn docs(&self) -> std::sync::MutexGuard<'_, Vec<Document>> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A [`DocumentStore`] that keeps every collection in memory.
pub struct MemoryStore {
    config: StoreConfig,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        info!("Opened memory store for {}", config.redacted_uri());
        Self {
            config,
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Names of the bound collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Number of stored documents in a bound collection.
    pub fn len(&self, name: &str) -> StoreResult<usize> {
        Ok(self.collection(name)?.docs().len())
    }

    fn collection(&self, name: &str) -> StoreResult<Arc<Collection>> {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }

    fn trace(&self, op: &str, collection: &str) {
        if self.config.debug {
            debug!("{}.{}", collection, op);
        }
    }

    fn check_fields(&self, collection: &str, schema: &SchemaRef, doc: &Document) -> StoreResult<()> {
        for (name, def) in schema.fields().iter() {
            let value = doc.get(name);
            let missing = match value {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => def.field_type == FieldType::String && s.is_empty(),
                Some(_) => false,
            };
            if missing {
                if def.required {
                    return Err(invalid(collection, format!("path `{name}` is required")));
                }
                continue;
            }
            if let Some(value) = value
                && !def.field_type.accepts(value)
            {
                return Err(invalid(
                    collection,
                    format!("path `{name}` expects {:?}, got {value}", def.field_type),
                ));
            }
        }
        Ok(())
    }

    /// Runs init middleware on a document read back from storage.
    async fn hydrate(&self, schema: &SchemaRef, doc: &mut Document) -> StoreResult<()> {
        fire(schema, Instruction::Pre, Command::Init, doc).await?;
        fire(schema, Instruction::Post, Command::Init, doc).await
    }

    fn populate(&self, populate: &Populate, schema: &SchemaRef, doc: &mut Document) -> StoreResult<()> {
        let reference = schema
            .fields()
            .get(&populate.path)
            .and_then(|def| def.reference.clone())
            .ok_or_else(|| {
                StoreError::Backend(format!(
                    "cannot populate `{}`: not a reference field of {}",
                    populate.path,
                    schema.model_name()
                ))
            })?;
        let target = self.collection(&reference)?;
        let Some(key) = doc.get(&populate.path).cloned() else {
            return Ok(());
        };

        let target_pk = target.schema.primary_key().to_string();
        let found = target
            .docs()
            .iter()
            .find(|d| d.get(&target_pk) == Some(&key))
            .cloned();

        let joined = match found {
            Some(mut subject) => {
                if let Some(select) = &populate.select {
                    let mut keep: Vec<&str> = select.iter().map(String::as_str).collect();
                    keep.push(&target_pk);
                    subject.retain_fields(&keep);
                }
                subject.into_value()
            }
            None => Value::Null,
        };
        doc.set(populate.path.clone(), joined);
        Ok(())
    }

    async fn query_hooks(&self, schema: &SchemaRef, command: Command, filter: &Filter) -> StoreResult<()> {
        let mut conditions = filter.conditions();
        fire(schema, Instruction::Pre, command, &mut conditions).await
    }

    async fn read(
        &self,
        handle: &CollectionHandle,
        filter: &Filter,
        command: Command,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Document>> {
        let collection = self.collection(handle.name())?;
        self.trace(command.as_str(), &collection.name);
        self.query_hooks(&collection.schema, command, filter).await?;

        let mut found: Vec<Document> = {
            let docs = collection.docs();
            let matched = docs.iter().filter(|d| filter.matches(d)).cloned();
            match limit {
                Some(n) => matched.take(n).collect(),
                None => matched.collect(),
            }
        };

        for doc in &mut found {
            self.hydrate(&collection.schema, doc).await?;
            fire(&collection.schema, Instruction::Post, command, doc).await?;
        }
        Ok(found)
    }
}

fn invalid(collection: &str, message: String) -> StoreError {
    StoreError::Validation {
        collection: collection.to_string(),
        message,
    }
}

async fn fire(
    schema: &SchemaRef,
    instruction: Instruction,
    command: Command,
    doc: &mut Document,
) -> StoreResult<()> {
    let callbacks = schema.middleware_for(instruction, command);
    if callbacks.is_empty() {
        return Ok(());
    }
    run_middleware(&callbacks, doc).await?;
    Ok(())
}

fn index_key(doc: &Document, fields: &[&str]) -> Vec<Value> {
    fields
        .iter()
        .map(|f| doc.get(f).cloned().unwrap_or(Value::Null))
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn bind(&self, name: &str, schema: SchemaRef) -> StoreResult<CollectionHandle> {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if collections.contains_key(name) {
            return Err(StoreError::DuplicateCollection(name.to_string()));
        }
        collections.insert(
            name.to_string(),
            Arc::new(Collection {
                name: name.to_string(),
                schema: schema.clone(),
                docs: Mutex::new(Vec::new()),
            }),
        );
        info!(
            "Bound collection {} ({} indexes)",
            name,
            schema.indexes().len()
        );
        Ok(CollectionHandle::new(name, schema))
    }

    fn construct(&self, handle: &CollectionHandle, initial: Document) -> StoreResult<Document> {
        let schema = handle.schema();
        let mut doc = initial;

        if schema.options().is_strict() {
            let mut keep: Vec<&str> = schema.fields().names().collect();
            keep.push(schema.primary_key());
            doc.retain_fields(&keep);
        }

        for (name, def) in schema.fields().iter() {
            if let Some(default) = &def.default
                && !doc.contains(name)
            {
                doc.set(name, default.resolve());
            }
        }

        if schema.has_implicit_primary_key() && doc.is_missing(schema.primary_key()) {
            doc.set(schema.primary_key(), DocumentId::new());
        }
        Ok(doc)
    }

    async fn validate(&self, handle: &CollectionHandle, doc: &mut Document) -> StoreResult<()> {
        let schema = handle.schema();
        fire(schema, Instruction::Pre, Command::Validate, doc).await?;
        self.check_fields(handle.name(), schema, doc)?;
        fire(schema, Instruction::Post, Command::Validate, doc).await
    }

    async fn save(&self, handle: &CollectionHandle, doc: &mut Document) -> StoreResult<()> {
        let collection = self.collection(handle.name())?;
        let schema = &collection.schema;
        self.trace("save", &collection.name);

        self.validate(handle, doc).await?;
        fire(schema, Instruction::Pre, Command::Save, doc).await?;

        if let Some(stamps) = schema.timestamps() {
            let now = Timestamp::now();
            if doc.is_missing(&stamps.created_at) {
                doc.set(stamps.created_at.clone(), now);
            }
            doc.set(stamps.updated_at.clone(), now);
        }

        let pk = schema.primary_key();
        let Some(id) = doc.get(pk).cloned().filter(|v| !v.is_null()) else {
            return Err(invalid(&collection.name, format!("primary key `{pk}` is missing")));
        };

        {
            let mut docs = collection.docs();
            let existing = docs.iter().position(|d| d.get(pk) == Some(&id));

            for index in schema.indexes().iter().filter(|i| i.options.unique) {
                let fields: Vec<&str> = index.spec.fields().collect();
                let key = index_key(doc, &fields);
                let clash = docs
                    .iter()
                    .enumerate()
                    .any(|(i, d)| Some(i) != existing && index_key(d, &fields) == key);
                if clash {
                    return Err(StoreError::DuplicateKey {
                        collection: collection.name.clone(),
                        index: index.name(),
                    });
                }
            }

            match existing {
                Some(i) => docs[i] = doc.clone(),
                None => docs.push(doc.clone()),
            }
        }

        fire(schema, Instruction::Post, Command::Save, doc).await
    }

    async fn find_one(&self, handle: &CollectionHandle, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(self
            .read(handle, filter, Command::FindOne, Some(1))
            .await?
            .into_iter()
            .next())
    }

    async fn find(&self, handle: &CollectionHandle, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.read(handle, filter, Command::Find, None).await
    }

    async fn find_one_and_update(
        &self,
        handle: &CollectionHandle,
        filter: &Filter,
        update: &Update,
        options: &UpdateOptions,
    ) -> StoreResult<Option<Document>> {
        let collection = self.collection(handle.name())?;
        let schema = &collection.schema;
        self.trace("findOneAndUpdate", &collection.name);
        self.query_hooks(schema, Command::FindOneAndUpdate, filter).await?;

        // Match and update under one lock.
        let result = {
            let mut docs = collection.docs();
            match docs.iter_mut().find(|d| filter.matches(d)) {
                Some(doc) => {
                    let before = doc.clone();
                    update.apply(doc);
                    if let Some(stamps) = schema.timestamps() {
                        doc.set(stamps.updated_at.clone(), Timestamp::now());
                    }
                    Some(if options.return_new { doc.clone() } else { before })
                }
                None => None,
            }
        };

        let Some(mut doc) = result else {
            return Ok(None);
        };
        self.hydrate(schema, &mut doc).await?;
        if let Some(populate) = &options.populate {
            self.populate(populate, schema, &mut doc)?;
        }
        fire(schema, Instruction::Post, Command::FindOneAndUpdate, &mut doc).await?;
        Ok(Some(doc))
    }

    async fn delete_many(&self, handle: &CollectionHandle, filter: &Filter) -> StoreResult<u64> {
        let collection = self.collection(handle.name())?;
        let schema = &collection.schema;
        let pk = schema.primary_key();
        self.trace("deleteMany", &collection.name);

        let mut matched: Vec<Document> = collection
            .docs()
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        for doc in &mut matched {
            fire(schema, Instruction::Pre, Command::Remove, doc).await?;
        }

        let ids: Vec<Value> = matched.iter().filter_map(|d| d.get(pk).cloned()).collect();
        let removed = {
            let mut docs = collection.docs();
            let before = docs.len();
            docs.retain(|d| !d.get(pk).is_some_and(|id| ids.contains(id)));
            (before - docs.len()) as u64
        };

        for doc in &mut matched {
            fire(schema, Instruction::Post, Command::Remove, doc).await?;
        }
        debug!("Removed {} documents from {}", removed, collection.name);
        Ok(removed)
    }
}
