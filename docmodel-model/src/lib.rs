//! Declarative document models.
//!
//! Application types implement [`ModelDefinition`] to describe a document
//! schema, primary key, timestamp policy, indexes and lifecycle hooks. A
//! [`ModelBuilder`] lazily compiles each definition exactly once and binds it
//! to a collection in a [`DocumentStore`], producing a runnable [`Model`].
//!
//! - [`event`] translates hook event names (`beforeSave`, `preDelete`, ...)
//!   into `(Instruction, Command)` middleware points
//! - [`CompiledSchema`] is the once-built descriptor: fields, options,
//!   primary key, indexes and middleware
//! - [`ModelRegistry`] holds per-type build state (cached schema, index
//!   buffer, boot gate)
//! - [`hooks`] covers inline middleware and `"Group.method"` handlers
//!   resolved through a [`HookRegistry`] when they fire
//!
//! Persistence is not implemented here; see `docmodel-store`.

mod builder;
mod definition;
mod error;
pub mod event;
pub mod hooks;
mod model;
pub mod query;
mod registry;
mod schema;
mod store;

pub use builder::ModelBuilder;
pub use definition::{Boot, ModelDefinition};
pub use error::{HookError, ModelError, ModelResult, StoreError, StoreResult, TranslationError};
pub use event::{Command, Instruction};
pub use hooks::{
    Hook, HookGroup, HookHandler, HookMethod, HookReference, HookRegistry, HookSignal, Middleware,
    NamedHook, Next, StaticHookRegistry,
};
pub use model::{Instance, Model};
pub use query::{Filter, Populate, Update, UpdateOptions};
pub use registry::ModelRegistry;
pub use schema::{
    CompiledSchema, CREATED_AT, DEFAULT_PRIMARY_KEY, FieldDef, FieldDefault, FieldType, Fields,
    IndexDecl, IndexOptions, IndexOrder, IndexSpec, SchemaOptions, SchemaRef, TimestampFields,
    UPDATED_AT, Virtual,
};
pub use store::{CollectionHandle, DocumentStore};
