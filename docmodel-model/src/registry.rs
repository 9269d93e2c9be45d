//! Per-type build state.
//!
//! Each model type owns one slot: the cached compiled schema, the index
//! buffer used before compilation, and the boot gate. A slot is guarded by
//! its own mutex so two concurrent builds of the same type compile once and
//! observe the same schema.

use crate::definition::ModelDefinition;
use crate::error::{ModelError, ModelResult};
use crate::schema::{CompiledSchema, IndexDecl, SchemaOptions, SchemaRef};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

struct SlotState {
    schema: Option<SchemaRef>,
    /// `Some` until the schema is compiled, then drained and cleared.
    pending_indexes: Option<Vec<IndexDecl>>,
}

enum BootState {
    Pending,
    Done,
    /// Boot returned an error; its message is replayed to later builds.
    Failed(String),
}

struct ModelSlot {
    state: Mutex<SlotState>,
    /// Held for the whole of boot so concurrent builds wait for it.
    boot: Mutex<BootState>,
}

impl ModelSlot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                schema: None,
                pending_indexes: Some(Vec::new()),
            }),
            boot: Mutex::new(BootState::Pending),
        }
    }
}

/// Map from model type to its build state.
#[derive(Default)]
pub struct ModelRegistry {
    slots: RwLock<HashMap<TypeId, Arc<ModelSlot>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot<D: ModelDefinition>(&self) -> Arc<ModelSlot> {
        let id = TypeId::of::<D>();
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return slot.clone();
        }
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_insert_with(|| Arc::new(ModelSlot::new()))
            .clone()
    }

    /// Buffers the index before compilation, attaches it directly after.
    pub fn declare_index<D: ModelDefinition>(&self, decl: IndexDecl) {
        let slot = self.slot::<D>();
        let mut guard = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        match &state.schema {
            Some(schema) => schema.add_index(decl.spec, Some(decl.options)),
            None => state.pending_indexes.get_or_insert_with(Vec::new).push(decl),
        }
    }

    /// Number of indexes waiting for compilation.
    pub fn pending_index_count<D: ModelDefinition>(&self) -> usize {
        let slot = self.slot::<D>();
        let state = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.pending_indexes.as_ref().map_or(0, Vec::len)
    }

    /// Compiles the schema for `D` once; later calls return the cached
    /// schema and ignore `options`. The index buffer is drained into the
    /// schema in declaration order on the compiling call.
    pub fn compile<D: ModelDefinition>(&self, options: SchemaOptions) -> ModelResult<SchemaRef> {
        let slot = self.slot::<D>();
        let mut guard = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        if let Some(schema) = &state.schema {
            return Ok(schema.clone());
        }

        let name = D::name();
        let fields = D::schema().ok_or_else(|| {
            ModelError::Configuration(format!(
                "model {name} does not declare a schema; override ModelDefinition::schema"
            ))
        })?;

        let schema = Arc::new(CompiledSchema::compile(
            name.as_str(),
            fields,
            D::primary_key(),
            D::timestamps(),
            &D::schema_options(),
            options,
        ));

        if let Some(pending) = state.pending_indexes.take() {
            debug!(model = %name, count = pending.len(), "flushing buffered indexes");
            for decl in pending {
                schema.add_index(decl.spec, Some(decl.options));
            }
        }

        state.schema = Some(schema.clone());
        Ok(schema)
    }

    /// The cached schema, if `D` has been compiled.
    pub fn cached<D: ModelDefinition>(&self) -> Option<SchemaRef> {
        let slot = self.slot::<D>();
        let state = slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.schema.clone()
    }

    /// Runs `boot` for `D` at most once.
    ///
    /// Concurrent callers block until the running boot finishes. A boot that
    /// succeeded is never run again; one that failed leaves the type
    /// unusable and later calls return a configuration error instead of
    /// re-applying a partial boot. `boot` must not build `D` itself.
    pub fn boot_once<D, F>(&self, boot: F) -> ModelResult<()>
    where
        D: ModelDefinition,
        F: FnOnce() -> ModelResult<()>,
    {
        let slot = self.slot::<D>();
        let mut state = slot.boot.lock().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            BootState::Done => return Ok(()),
            BootState::Failed(reason) => {
                return Err(ModelError::Configuration(format!(
                    "model {} failed to boot: {reason}",
                    D::name()
                )));
            }
            BootState::Pending => {}
        }
        match boot() {
            Ok(()) => {
                *state = BootState::Done;
                Ok(())
            }
            Err(e) => {
                *state = BootState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Whether boot has completed successfully for `D`.
    pub fn is_booted<D: ModelDefinition>(&self) -> bool {
        let slot = self.slot::<D>();
        let state = slot.boot.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(*state, BootState::Done)
    }
}
