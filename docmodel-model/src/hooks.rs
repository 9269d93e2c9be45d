//! Lifecycle middleware: callbacks, completion signals and the named hook
//! registry.
//!
//! A hook handler is either an inline callback or a `"Group.method"` string.
//! String handlers are resolved against a [`HookRegistry`] each time the
//! lifecycle point fires, so a hook may be declared before its group is
//! registered.
//!
//! Both kinds are awaited: the store does not continue past a lifecycle
//! point until every callback registered on it has signalled. Plain
//! closures are accepted for hooks that need no I/O; implement [`Hook`] or
//! [`HookMethod`] for ones that do.

use crate::error::HookError;
use async_trait::async_trait;
use crate::event::{Command, Instruction};
use docmodel_types::Document;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

/// Completion signal handed to every inline middleware.
///
/// Consuming it is the only way to produce the [`HookSignal`] the callback
/// must return, so each invocation signals exactly once.
#[derive(Debug)]
pub struct Next {
    _priv: (),
}

impl Next {
    pub(crate) fn new() -> Self {
        Self { _priv: () }
    }

    /// Signals success.
    pub fn done(self) -> HookSignal {
        HookSignal(Ok(()))
    }

    /// Signals failure for this lifecycle point.
    pub fn fail(self, err: impl Into<HookError>) -> HookSignal {
        HookSignal(Err(err.into()))
    }

    /// Forwards the outcome of a fallible call.
    pub fn result(self, result: Result<(), HookError>) -> HookSignal {
        HookSignal(result)
    }
}

/// Outcome of one middleware invocation.
#[must_use]
#[derive(Debug)]
pub struct HookSignal(Result<(), HookError>);

impl HookSignal {
    pub fn into_result(self) -> Result<(), HookError> {
        self.0
    }
}

/// Inline middleware: receives the in-progress document and the completion
/// signal.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, doc: &mut Document, next: Next) -> HookSignal;
}

/// A method of a named hook group. Receives the document as its only
/// argument; returning `Err` fails the lifecycle point.
#[async_trait]
pub trait HookMethod: Send + Sync {
    async fn call(&self, doc: &mut Document) -> Result<(), HookError>;
}

pub type Middleware = Arc<dyn Hook>;

pub type NamedHook = Arc<dyn HookMethod>;

struct FnHook<F>(F);

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&mut Document, Next) -> HookSignal + Send + Sync,
{
    async fn call(&self, doc: &mut Document, next: Next) -> HookSignal {
        (self.0)(doc, next)
    }
}

struct FnMethod<F>(F);

#[async_trait]
impl<F> HookMethod for FnMethod<F>
where
    F: Fn(&mut Document) -> Result<(), HookError> + Send + Sync,
{
    async fn call(&self, doc: &mut Document) -> Result<(), HookError> {
        (self.0)(doc)
    }
}

/// Middleware from a synchronous closure.
pub fn from_fn<F>(f: F) -> Middleware
where
    F: Fn(&mut Document, Next) -> HookSignal + Send + Sync + 'static,
{
    Arc::new(FnHook(f))
}

/// Handler passed to `add_hook`.
#[derive(Clone)]
pub enum HookHandler {
    Inline(Middleware),
    /// `"Group.method"`, resolved when the hook fires.
    Named(String),
}

impl HookHandler {
    pub fn inline<F>(f: F) -> Self
    where
        F: Fn(&mut Document, Next) -> HookSignal + Send + Sync + 'static,
    {
        Self::Inline(from_fn(f))
    }

    /// Inline middleware that may await.
    pub fn hook(hook: impl Hook + 'static) -> Self {
        Self::Inline(Arc::new(hook))
    }

    pub fn named(reference: impl Into<String>) -> Self {
        Self::Named(reference.into())
    }
}

impl From<&str> for HookHandler {
    fn from(reference: &str) -> Self {
        Self::Named(reference.to_string())
    }
}

impl From<String> for HookHandler {
    fn from(reference: String) -> Self {
        Self::Named(reference)
    }
}

impl fmt::Debug for HookHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(..)"),
            Self::Named(r) => f.debug_tuple("Named").field(r).finish(),
        }
    }
}

/// A parsed `"Group.method"` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookReference {
    pub group: String,
    pub method: String,
}

impl HookReference {
    /// Splits at the last dot, so groups may themselves be dotted.
    pub fn parse(reference: &str) -> Result<Self, HookError> {
        match reference.rsplit_once('.') {
            Some((group, method)) if !group.is_empty() && !method.is_empty() => Ok(Self {
                group: group.to_string(),
                method: method.to_string(),
            }),
            _ => Err(HookError::MalformedReference(reference.to_string())),
        }
    }
}

impl fmt::Display for HookReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.method)
    }
}

/// A table of named hook methods.
#[derive(Clone, Default)]
pub struct HookGroup {
    methods: HashMap<String, NamedHook>,
}

impl HookGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a synchronous method to the group.
    pub fn method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Document) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.async_method(name, FnMethod(f))
    }

    /// Adds a method that may await.
    pub fn async_method(mut self, name: impl Into<String>, method: impl HookMethod + 'static) -> Self {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn get(&self, name: &str) -> Option<NamedHook> {
        self.methods.get(name).cloned()
    }
}

impl fmt::Debug for HookGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("HookGroup").field("methods", &names).finish()
    }
}

/// Resolves hook group names to method tables.
pub trait HookRegistry: Send + Sync {
    fn lookup(&self, group: &str) -> Option<Arc<HookGroup>>;
}

/// An in-process [`HookRegistry`] that groups can be added to at any time.
#[derive(Default)]
pub struct StaticHookRegistry {
    groups: RwLock<HashMap<String, Arc<HookGroup>>>,
}

impl StaticHookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a group.
    pub fn register(&self, name: impl Into<String>, group: HookGroup) {
        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(group));
    }
}

impl HookRegistry for StaticHookRegistry {
    fn lookup(&self, group: &str) -> Option<Arc<HookGroup>> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(group)
            .cloned()
    }
}

/// A named reference that resolves itself on every call.
struct LazyHook {
    reference: HookReference,
    registry: Arc<dyn HookRegistry>,
}

#[async_trait]
impl Hook for LazyHook {
    async fn call(&self, doc: &mut Document, next: Next) -> HookSignal {
        let reference = &self.reference;
        let Some(group) = self.registry.lookup(&reference.group) else {
            warn!(hook = %reference, "hook group not registered");
            return next.fail(HookError::UnknownGroup {
                group: reference.group.clone(),
            });
        };
        let Some(method) = group.get(&reference.method) else {
            return next.fail(HookError::UnknownMethod {
                group: reference.group.clone(),
                method: reference.method.clone(),
            });
        };
        next.result(method.call(doc).await)
    }
}

pub(crate) fn resolve_lazily(reference: HookReference, registry: Arc<dyn HookRegistry>) -> Middleware {
    Arc::new(LazyHook { reference, registry })
}

struct Entry {
    instruction: Instruction,
    command: Command,
    callback: Middleware,
}

/// Middleware registered on a schema, in registration order.
#[derive(Default)]
pub struct MiddlewareStack {
    entries: Vec<Entry>,
}

impl MiddlewareStack {
    pub fn push(&mut self, instruction: Instruction, command: Command, callback: Middleware) {
        self.entries.push(Entry {
            instruction,
            command,
            callback,
        });
    }

    pub fn callbacks_for(&self, instruction: Instruction, command: Command) -> Vec<Middleware> {
        self.entries
            .iter()
            .filter(|e| e.instruction == instruction && e.command == command)
            .map(|e| e.callback.clone())
            .collect()
    }

    pub fn count_for(&self, instruction: Instruction, command: Command) -> usize {
        self.entries
            .iter()
            .filter(|e| e.instruction == instruction && e.command == command)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs callbacks in order, awaiting each, stopping at the first failure.
pub async fn run_middleware(callbacks: &[Middleware], doc: &mut Document) -> Result<(), HookError> {
    for callback in callbacks {
        callback.call(doc, Next::new()).await.into_result()?;
    }
    Ok(())
}
