//! The declaration surface application models implement.

use crate::builder::ModelBuilder;
use crate::error::ModelResult;
use crate::hooks::HookHandler;
use crate::schema::{
    CompiledSchema, DEFAULT_PRIMARY_KEY, Fields, IndexOptions, IndexSpec, SchemaOptions, SchemaRef,
    Virtual,
};

/// Declares a model: its fields, primary key, timestamp policy, options,
/// virtual fields and a boot callback.
///
/// Everything is declared at the type level; the builder compiles it once
/// per type.
///
/// ```
/// use docmodel_model::{FieldDef, Fields, ModelDefinition};
///
/// struct User;
///
/// impl ModelDefinition for User {
///     fn schema() -> Option<Fields> {
///         Some(
///             Fields::new()
///                 .field("email", FieldDef::string().required())
///                 .field("password", FieldDef::string()),
///         )
///     }
/// }
/// ```
pub trait ModelDefinition: Send + Sync + 'static {
    /// Field declarations. A model without a schema cannot be built.
    fn schema() -> Option<Fields> {
        None
    }

    fn primary_key() -> &'static str {
        DEFAULT_PRIMARY_KEY
    }

    /// Whether `createdAt`/`updatedAt` are maintained.
    fn timestamps() -> bool {
        true
    }

    fn schema_options() -> SchemaOptions {
        SchemaOptions::default()
    }

    /// Computed fields bound onto the schema at build time.
    fn virtuals() -> Vec<Virtual> {
        Vec::new()
    }

    /// Runs once, after the schema is compiled and buffered indexes are
    /// flushed, before the model is bound to its collection.
    fn boot(boot: &Boot<'_>) -> ModelResult<()> {
        let _ = boot;
        Ok(())
    }

    /// Display name used in logs and errors.
    fn name() -> String {
        short_type_name::<Self>()
    }
}

/// `my_app::models::User` -> `User`, `auth::Token<auth::DefaultToken>` -> `Token`.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Handle passed to [`ModelDefinition::boot`]. Indexes and hooks declared
/// here attach directly to the compiled schema.
pub struct Boot<'a> {
    builder: &'a ModelBuilder,
    schema: SchemaRef,
}

impl<'a> Boot<'a> {
    pub(crate) fn new(builder: &'a ModelBuilder, schema: SchemaRef) -> Self {
        Self { builder, schema }
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    pub fn index(&self, spec: IndexSpec, options: Option<IndexOptions>) -> &Self {
        self.schema.add_index(spec, options);
        self
    }

    /// Registers a hook; see [`ModelBuilder::add_hook`].
    pub fn add_hook(&self, event: &str, handler: impl Into<HookHandler>) -> ModelResult<&Self> {
        self.builder.attach_hook(&self.schema, event, handler.into())?;
        Ok(self)
    }
}
