//! Orchestrates compile, index flush, boot and store binding.

use crate::definition::{Boot, ModelDefinition};
use crate::error::{ModelError, ModelResult};
use crate::event;
use crate::hooks::{resolve_lazily, HookHandler, HookReference, HookRegistry, StaticHookRegistry};
use crate::model::Model;
use crate::registry::ModelRegistry;
use crate::schema::{CompiledSchema, IndexDecl, IndexOptions, IndexSpec, SchemaOptions, SchemaRef};
use crate::store::DocumentStore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds runnable models from [`ModelDefinition`]s against one store.
pub struct ModelBuilder {
    store: Arc<dyn DocumentStore>,
    hooks: Arc<dyn HookRegistry>,
    registry: ModelRegistry,
}

impl ModelBuilder {
    /// Creates a builder with an empty hook registry.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            hooks: Arc::new(StaticHookRegistry::new()),
            registry: ModelRegistry::new(),
        }
    }

    /// Uses `hooks` to resolve `"Group.method"` handlers.
    pub fn with_hook_registry(mut self, hooks: Arc<dyn HookRegistry>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Declares an index on `D`. Before `D` is compiled the index is
    /// buffered; afterwards it attaches directly.
    pub fn index<D: ModelDefinition>(&self, spec: IndexSpec, options: Option<IndexOptions>) -> &Self {
        self.registry.declare_index::<D>(IndexDecl::new(spec, options));
        self
    }

    /// Registers lifecycle middleware on `D`, compiling its schema with
    /// default options if needed.
    ///
    /// `event` is translated (`beforeSave` -> `pre save`); an unknown
    /// instruction or command is an error.
    pub fn add_hook<D: ModelDefinition>(
        &self,
        event: &str,
        handler: impl Into<HookHandler>,
    ) -> ModelResult<&Self> {
        let schema = self.registry.compile::<D>(SchemaOptions::default())?;
        self.attach_hook(&schema, event, handler.into())?;
        Ok(self)
    }

    pub(crate) fn attach_hook(
        &self,
        schema: &CompiledSchema,
        event: &str,
        handler: HookHandler,
    ) -> ModelResult<()> {
        let (instruction, command) = event::format(event)?;
        let callback = match handler {
            HookHandler::Inline(callback) => callback,
            HookHandler::Named(reference) => {
                let reference = HookReference::parse(&reference)
                    .map_err(|e| ModelError::Configuration(e.to_string()))?;
                resolve_lazily(reference, self.hooks.clone())
            }
        };
        debug!(model = %schema.model_name(), %instruction, %command, event, "hook registered");
        schema.add_middleware(instruction, command, callback);
        Ok(())
    }

    /// Compiles (or returns the cached) schema for `D`.
    pub fn compile<D: ModelDefinition>(&self, options: SchemaOptions) -> ModelResult<SchemaRef> {
        self.registry.compile::<D>(options)
    }

    /// The compiled schema for `D`, if any.
    pub fn schema<D: ModelDefinition>(&self) -> Option<SchemaRef> {
        self.registry.cached::<D>()
    }

    /// Builds `D` and binds it to the collection `name`.
    pub fn build<D: ModelDefinition>(&self, name: &str) -> ModelResult<Model> {
        self.build_with::<D>(name, SchemaOptions::default())
    }

    /// Like [`build`](Self::build), with schema options that apply only if
    /// this call compiles the schema.
    ///
    /// A schema is compiled by whichever comes first of `build_with`,
    /// [`compile`](Self::compile) and [`add_hook`](Self::add_hook) (which
    /// uses default options). Options passed after that are ignored and a
    /// warning is logged. Binding the same name twice is rejected by the
    /// store.
    pub fn build_with<D: ModelDefinition>(
        &self,
        name: &str,
        options: SchemaOptions,
    ) -> ModelResult<Model> {
        if name.trim().is_empty() {
            return Err(ModelError::Configuration(format!(
                "building {} requires a non-empty `name`",
                D::name()
            )));
        }

        if options != SchemaOptions::default() && self.registry.cached::<D>().is_some() {
            warn!(
                "Ignoring build options for {}: its schema is already compiled",
                D::name()
            );
        }
        let schema = self.registry.compile::<D>(options)?;

        self.registry.boot_once::<D, _>(|| {
            for v in D::virtuals() {
                schema.add_virtual(v);
            }
            D::boot(&Boot::new(self, schema.clone()))?;
            debug!(model = %D::name(), "booted");
            Ok(())
        })?;

        let handle = self.store.bind(name, schema)?;
        info!(model = %D::name(), collection = name, "model bound");
        Ok(Model::new(handle, self.store.clone()))
    }
}

impl fmt::Debug for ModelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBuilder").finish_non_exhaustive()
    }
}
