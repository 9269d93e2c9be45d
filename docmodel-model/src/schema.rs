//! Schema descriptors and the schema compiler.

use crate::event::{Command, Instruction};
use crate::hooks::{Middleware, MiddlewareStack};
use docmodel_types::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Field name injected for the creation timestamp.
pub const CREATED_AT: &str = "createdAt";
/// Field name injected for the last-update timestamp.
pub const UPDATED_AT: &str = "updatedAt";
/// Primary key used when a model does not override it.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// The data type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    /// Milliseconds since the Unix epoch.
    Date,
    /// A document identifier, possibly referencing another collection.
    Id,
    Array,
    /// Any JSON value.
    Mixed,
}

impl FieldType {
    /// Returns true if `value` is acceptable for this type. Null is handled
    /// by the required check, not here.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Date => value.is_i64(),
            Self::Id => value.is_string() || value.is_i64() || value.is_u64() || value.is_object(),
            Self::Array => value.is_array(),
            Self::Mixed => true,
        }
    }
}

/// Default applied to a missing field when an instance is constructed.
#[derive(Clone)]
pub enum FieldDefault {
    Value(Value),
    /// Evaluated on every construction (e.g. "now + 5 days").
    Computed(fn() -> Value),
}

impl FieldDefault {
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Computed(f) => f(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A single field declaration: type, constraints and default.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub field_type: FieldType,
    pub required: bool,
    pub default: Option<FieldDefault>,
    /// Name of the model this field references, for joins.
    pub reference: Option<String>,
}

impl FieldDef {
    fn simple(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            default: None,
            reference: None,
        }
    }

    pub fn string() -> Self {
        Self::simple(FieldType::String)
    }

    pub fn number() -> Self {
        Self::simple(FieldType::Number)
    }

    pub fn integer() -> Self {
        Self::simple(FieldType::Integer)
    }

    pub fn boolean() -> Self {
        Self::simple(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::simple(FieldType::Date)
    }

    pub fn id() -> Self {
        Self::simple(FieldType::Id)
    }

    pub fn array() -> Self {
        Self::simple(FieldType::Array)
    }

    pub fn mixed() -> Self {
        Self::simple(FieldType::Mixed)
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets a static default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Sets a default computed at construction time.
    pub fn default_with(mut self, f: fn() -> Value) -> Self {
        self.default = Some(FieldDefault::Computed(f));
        self
    }

    /// Declares that the field references documents of another model.
    pub fn reference(mut self, model: impl Into<String>) -> Self {
        self.reference = Some(model.into());
        self
    }
}

/// Ordered set of field declarations.
#[derive(Debug, Clone, Default)]
pub struct Fields(Vec<(String, FieldDef)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds (or replaces) a field, keeping declaration order.
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = def,
            None => self.0.push((name, def)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDef)> {
        self.0.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Names of the automatically maintained timestamp fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampFields {
    pub created_at: String,
    pub updated_at: String,
}

impl Default for TimestampFields {
    fn default() -> Self {
        Self {
            created_at: CREATED_AT.to_string(),
            updated_at: UPDATED_AT.to_string(),
        }
    }
}

/// Schema construction options.
///
/// Unset options fall back, in order, to the caller's build options, the
/// model's static options and finally the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaOptions {
    /// Drop undeclared fields on construction. Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    /// Set by compilation when the model keeps timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<TimestampFields>,
}

impl SchemaOptions {
    /// Fills every unset option of `self` from `fallback`.
    pub fn merged_with(self, fallback: &SchemaOptions) -> Self {
        Self {
            strict: self.strict.or(fallback.strict),
            timestamps: self.timestamps.or_else(|| fallback.timestamps.clone()),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict.unwrap_or(true)
    }
}

/// Sort order or kind of one indexed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOrder {
    Ascending,
    Descending,
    Text,
}

/// The keys of an index, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec(pub Vec<(String, IndexOrder)>);

impl IndexSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self(vec![(field.into(), IndexOrder::Ascending)])
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self(vec![(field.into(), IndexOrder::Descending)])
    }

    /// Appends another key to a compound index.
    pub fn then(mut self, field: impl Into<String>, order: IndexOrder) -> Self {
        self.0.push((field.into(), order));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(f, _)| f.as_str())
    }

    /// Conventional index name, e.g. `token_1` or `a_1_b_-1`.
    pub fn name(&self) -> String {
        self.0
            .iter()
            .map(|(f, o)| {
                let suffix = match o {
                    IndexOrder::Ascending => "1",
                    IndexOrder::Descending => "-1",
                    IndexOrder::Text => "text",
                };
                format!("{f}_{suffix}")
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Index options. `background` defaults to true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    pub background: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            background: true,
            unique: false,
            name: None,
        }
    }
}

impl IndexOptions {
    pub fn unique() -> Self {
        Self {
            unique: true,
            ..Self::default()
        }
    }

    pub fn foreground() -> Self {
        Self {
            background: false,
            ..Self::default()
        }
    }
}

/// An index attached to a compiled schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDecl {
    pub spec: IndexSpec,
    pub options: IndexOptions,
}

impl IndexDecl {
    pub fn new(spec: IndexSpec, options: Option<IndexOptions>) -> Self {
        Self {
            spec,
            options: options.unwrap_or_default(),
        }
    }

    pub fn name(&self) -> String {
        self.options.name.clone().unwrap_or_else(|| self.spec.name())
    }
}

/// A computed, read-only field resolved from the stored document.
#[derive(Clone)]
pub struct Virtual {
    pub name: String,
    pub getter: fn(&Document) -> Value,
}

impl Virtual {
    pub fn new(name: impl Into<String>, getter: fn(&Document) -> Value) -> Self {
        Self {
            name: name.into(),
            getter,
        }
    }
}

impl fmt::Debug for Virtual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Virtual").field("name", &self.name).finish()
    }
}

/// The once-built descriptor of a model.
///
/// Fields, options and primary key are fixed at compile time. Indexes,
/// middleware and virtuals are attached afterwards through `&self`.
pub struct CompiledSchema {
    model: String,
    fields: Fields,
    options: SchemaOptions,
    primary_key: String,
    indexes: RwLock<Vec<IndexDecl>>,
    middleware: RwLock<MiddlewareStack>,
    virtuals: RwLock<Vec<Virtual>>,
}

impl CompiledSchema {
    /// Compiles a schema from raw declarations.
    ///
    /// `model` is a display name used in logs and errors. When `timestamps`
    /// is set, `createdAt`/`updatedAt` date fields are appended and the
    /// options carry those names. The names are fixed: any timestamp names
    /// in the options are replaced.
    pub fn compile(
        model: impl Into<String>,
        fields: Fields,
        primary_key: impl Into<String>,
        timestamps: bool,
        static_options: &SchemaOptions,
        build_options: SchemaOptions,
    ) -> Self {
        let model = model.into();
        let mut options = build_options.merged_with(static_options);
        let mut fields = fields;

        if timestamps {
            let names = TimestampFields::default();
            fields = fields
                .field(names.created_at.clone(), FieldDef::date())
                .field(names.updated_at.clone(), FieldDef::date());
            options.timestamps = Some(names);
        } else {
            options.timestamps = None;
        }

        let primary_key = primary_key.into();
        debug!(model = %model, primary_key = %primary_key, fields = fields.len(), "compiled schema");

        Self {
            model,
            fields,
            options,
            primary_key,
            indexes: RwLock::new(Vec::new()),
            middleware: RwLock::new(MiddlewareStack::default()),
            virtuals: RwLock::new(Vec::new()),
        }
    }

    /// Display name of the model this schema was compiled from.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// The primary key field name, discoverable without the model type.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// True if the primary key is generated rather than declared.
    pub fn has_implicit_primary_key(&self) -> bool {
        !self.fields.contains(&self.primary_key)
    }

    pub fn timestamps(&self) -> Option<&TimestampFields> {
        self.options.timestamps.as_ref()
    }

    /// Attaches an index.
    pub fn add_index(&self, spec: IndexSpec, options: Option<IndexOptions>) {
        let decl = IndexDecl::new(spec, options);
        debug!(model = %self.model, index = %decl.name(), "index attached");
        self.indexes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decl);
    }

    /// Snapshot of the attached indexes, in declaration order.
    pub fn indexes(&self) -> Vec<IndexDecl> {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Registers a middleware callback at a lifecycle point.
    pub fn add_middleware(&self, instruction: Instruction, command: Command, callback: Middleware) {
        self.middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(instruction, command, callback);
    }

    /// Callbacks registered for a lifecycle point, in registration order.
    pub fn middleware_for(&self, instruction: Instruction, command: Command) -> Vec<Middleware> {
        self.middleware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks_for(instruction, command)
    }

    /// Number of middleware callbacks registered at a lifecycle point.
    pub fn middleware_count(&self, instruction: Instruction, command: Command) -> usize {
        self.middleware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .count_for(instruction, command)
    }

    pub(crate) fn add_virtual(&self, v: Virtual) {
        self.virtuals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(v);
    }

    /// Resolves a virtual field against a document.
    pub fn resolve_virtual(&self, name: &str, doc: &Document) -> Option<Value> {
        self.virtuals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|v| v.name == name)
            .map(|v| (v.getter)(doc))
    }

    /// Names of the bound virtual fields.
    pub fn virtual_names(&self) -> Vec<String> {
        self.virtuals
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|v| v.name.clone())
            .collect()
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("model", &self.model)
            .field("fields", &self.fields)
            .field("options", &self.options)
            .field("primary_key", &self.primary_key)
            .field("indexes", &self.indexes())
            .finish_non_exhaustive()
    }
}

/// Shared handle to a compiled schema.
pub type SchemaRef = Arc<CompiledSchema>;
