mod common;

use common::RecordingStore;
use docmodel_model::{
    Boot, Command, FieldDef, Fields, HookError, HookGroup, HookHandler, IndexOptions, IndexSpec,
    Instruction, ModelBuilder, ModelDefinition, ModelError, ModelResult, SchemaOptions,
    StaticHookRegistry, StoreError, TranslationError, Virtual,
};
use docmodel_types::Document;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn builder() -> (Arc<RecordingStore>, ModelBuilder) {
    let store = Arc::new(RecordingStore::default());
    let builder = ModelBuilder::new(store.clone());
    (store, builder)
}

fn name_num() -> Fields {
    Fields::new()
        .field("name", FieldDef::string())
        .field("num", FieldDef::number())
}

struct Plain;

impl ModelDefinition for Plain {
    fn schema() -> Option<Fields> {
        Some(name_num())
    }
}

struct Schemaless;

impl ModelDefinition for Schemaless {}

// ── Build ────────────────────────────────────────────────────────

#[test]
fn build_binds_collection() {
    let (store, builder) = builder();
    let model = builder.build::<Plain>("M1").unwrap();
    assert_eq!(model.name(), "M1");
    assert_eq!(model.primary_key(), "id");
    assert_eq!(store.bound_names(), vec!["M1".to_string()]);
}

#[test]
fn build_requires_a_name() {
    let (store, builder) = builder();
    for name in ["", "   "] {
        let err = builder.build::<Plain>(name).unwrap_err();
        assert!(matches!(err, ModelError::Configuration(_)), "{err}");
    }
    assert!(store.bound_names().is_empty());
}

#[test]
fn build_without_schema_fails() {
    let (_, builder) = builder();
    let err = builder.build::<Schemaless>("S").unwrap_err();
    assert!(matches!(err, ModelError::Configuration(_)));
}

#[test]
fn binding_a_name_twice_fails() {
    let (_, builder) = builder();
    builder.build::<Plain>("Dup").unwrap();
    let err = builder.build::<Plain>("Dup").unwrap_err();
    assert!(matches!(err, ModelError::Store(StoreError::DuplicateCollection(name)) if name == "Dup"));
}

#[test]
fn repeated_builds_share_one_schema() {
    let (_, builder) = builder();
    let a = builder.build::<Plain>("A").unwrap();
    let b = builder
        .build_with::<Plain>(
            "B",
            SchemaOptions {
                strict: Some(false),
                ..SchemaOptions::default()
            },
        )
        .unwrap();
    assert!(Arc::ptr_eq(a.schema(), b.schema()));
    assert!(b.schema().options().is_strict());
}

#[test]
fn timestamps_follow_the_definition() {
    struct NoStamps;
    impl ModelDefinition for NoStamps {
        fn schema() -> Option<Fields> {
            Some(name_num())
        }
        fn timestamps() -> bool {
            false
        }
    }

    let (_, builder) = builder();
    let stamped = builder.build::<Plain>("M4").unwrap();
    let plain = builder.build::<NoStamps>("M4-T").unwrap();
    assert!(stamped.schema().timestamps().is_some());
    assert!(plain.schema().timestamps().is_none());
    assert!(!plain.schema().fields().contains("createdAt"));
}

// ── Boot ─────────────────────────────────────────────────────────

static BOOTS: AtomicUsize = AtomicUsize::new(0);

struct Counted;

impl ModelDefinition for Counted {
    fn schema() -> Option<Fields> {
        Some(name_num())
    }

    fn boot(boot: &Boot<'_>) -> ModelResult<()> {
        BOOTS.fetch_add(1, Ordering::SeqCst);
        boot.index(IndexSpec::ascending("num"), None);
        Ok(())
    }
}

#[test]
fn boot_runs_once_per_type() {
    let (_, builder) = builder();
    builder.build::<Counted>("C1").unwrap();
    let model = builder.build::<Counted>("C2").unwrap();
    assert_eq!(BOOTS.load(Ordering::SeqCst), 1);
    assert_eq!(model.schema().indexes().len(), 1);
}

struct Indexed;

impl ModelDefinition for Indexed {
    fn schema() -> Option<Fields> {
        Some(name_num())
    }

    fn boot(boot: &Boot<'_>) -> ModelResult<()> {
        boot.index(IndexSpec::ascending("num"), None);
        Ok(())
    }
}

#[test]
fn buffered_index_precedes_boot_index() {
    let (_, builder) = builder();
    builder.index::<Indexed>(IndexSpec::ascending("name"), Some(IndexOptions::foreground()));
    assert_eq!(builder.registry().pending_index_count::<Indexed>(), 1);

    let model = builder.build::<Indexed>("M6").unwrap();
    let indexes = model.schema().indexes();
    assert_eq!(indexes.len(), 2);
    assert_eq!(indexes[0].spec, IndexSpec::ascending("name"));
    assert!(!indexes[0].options.background);
    assert_eq!(indexes[1].spec, IndexSpec::ascending("num"));
    assert!(indexes[1].options.background);
    assert_eq!(builder.registry().pending_index_count::<Indexed>(), 0);
}

struct BadHook;

impl ModelDefinition for BadHook {
    fn schema() -> Option<Fields> {
        Some(name_num())
    }

    fn boot(boot: &Boot<'_>) -> ModelResult<()> {
        boot.add_hook("preSaved", HookHandler::inline(|_, next| next.done()))?;
        Ok(())
    }
}

#[test]
fn invalid_event_in_boot_fails_the_build() {
    let (store, builder) = builder();
    let err = builder.build::<BadHook>("Bad").unwrap_err();
    assert!(matches!(
        err,
        ModelError::Translation(TranslationError::InvalidCommand { ref command, .. }) if command == "saved"
    ));
    assert!(store.bound_names().is_empty());
}

struct HalfBoot;

impl ModelDefinition for HalfBoot {
    fn schema() -> Option<Fields> {
        Some(name_num())
    }

    fn boot(boot: &Boot<'_>) -> ModelResult<()> {
        boot.index(IndexSpec::ascending("num"), None);
        boot.add_hook("preSaved", HookHandler::inline(|_, next| next.done()))?;
        Ok(())
    }
}

#[test]
fn failed_boot_keeps_failing_later_builds() {
    let (store, builder) = builder();
    assert!(builder.build::<HalfBoot>("First").is_err());

    let err = builder.build::<HalfBoot>("Second").unwrap_err();
    assert!(matches!(err, ModelError::Configuration(ref msg) if msg.contains("failed to boot")));
    assert!(!builder.registry().is_booted::<HalfBoot>());
    assert!(store.bound_names().is_empty());
    // The partial boot is not applied a second time.
    assert_eq!(builder.schema::<HalfBoot>().unwrap().indexes().len(), 1);
}

static SLOW_BOOTS: AtomicUsize = AtomicUsize::new(0);

struct SlowBoot;

impl ModelDefinition for SlowBoot {
    fn schema() -> Option<Fields> {
        Some(name_num())
    }

    fn boot(boot: &Boot<'_>) -> ModelResult<()> {
        std::thread::sleep(std::time::Duration::from_millis(30));
        SLOW_BOOTS.fetch_add(1, Ordering::SeqCst);
        boot.index(IndexSpec::ascending("num"), None);
        Ok(())
    }
}

#[test]
fn concurrent_builds_bind_after_boot() {
    let (store, builder) = builder();
    let index_counts: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let builder = &builder;
                scope.spawn(move || {
                    let model = builder.build::<SlowBoot>(&format!("Slow{i}")).unwrap();
                    model.schema().indexes().len()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(SLOW_BOOTS.load(Ordering::SeqCst), 1);
    assert_eq!(index_counts, vec![1, 1, 1, 1]);
    assert_eq!(store.bound_names().len(), 4);
}

struct WithVirtual;

impl ModelDefinition for WithVirtual {
    fn schema() -> Option<Fields> {
        Some(name_num())
    }

    fn virtuals() -> Vec<Virtual> {
        vec![Virtual::new("shout", |doc: &Document| {
            json!(doc.get_str("name").unwrap_or_default().to_uppercase())
        })]
    }
}

#[test]
fn virtuals_are_bound_at_build() {
    let (_, builder) = builder();
    let model = builder.build::<WithVirtual>("V").unwrap();
    let instance = model.instance(json!({"name": "abc"})).unwrap();
    assert_eq!(instance.get("shout"), Some(json!("ABC")));
    assert_eq!(instance.get("name"), Some(json!("abc")));
    assert_eq!(instance.get("missing"), None);
}

// ── Hooks ────────────────────────────────────────────────────────

struct Hooked;

impl ModelDefinition for Hooked {
    fn schema() -> Option<Fields> {
        Some(name_num())
    }
}

#[tokio::test]
async fn pre_validate_hook_runs_once_with_document() {
    let (_, builder) = builder();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    builder
        .add_hook::<Hooked>(
            "preValidate",
            HookHandler::inline(move |doc, next| {
                seen.fetch_add(1, Ordering::SeqCst);
                if doc.get_i64("num") == Some(5) {
                    next.done()
                } else {
                    next.fail("num should be 5")
                }
            }),
        )
        .unwrap();

    let model = builder.build::<Hooked>("M2").unwrap();
    let mut instance = model.instance(json!({"num": 5})).unwrap();
    instance.validate().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn add_hook_compiles_the_schema() {
    let (_, builder) = builder();
    assert!(builder.schema::<Hooked>().is_none());
    builder
        .add_hook::<Hooked>("beforeSave", HookHandler::inline(|_, next| next.done()))
        .unwrap();
    let schema = builder.schema::<Hooked>().unwrap();
    assert_eq!(schema.middleware_count(Instruction::Pre, Command::Save), 1);
}

#[test]
fn build_options_after_add_hook_are_ignored() {
    let (_, builder) = builder();
    builder
        .add_hook::<Hooked>("beforeSave", HookHandler::inline(|_, next| next.done()))
        .unwrap();
    let lenient = SchemaOptions {
        strict: Some(false),
        ..SchemaOptions::default()
    };
    let model = builder.build_with::<Hooked>("Late", lenient).unwrap();
    assert!(model.schema().options().is_strict());
}

#[test]
fn builder_debug_hides_internals() {
    let (_, builder) = builder();
    assert_eq!(format!("{builder:?}"), "ModelBuilder { .. }");
}

#[test]
fn add_hook_rejects_bad_event_names() {
    let (_, builder) = builder();
    let err = builder
        .add_hook::<Hooked>("presSaved", HookHandler::inline(|_, next| next.done()))
        .unwrap_err();
    assert!(matches!(
        err,
        ModelError::Translation(TranslationError::InvalidInstruction { .. })
    ));
}

#[test]
fn add_hook_rejects_malformed_references() {
    let (_, builder) = builder();
    let err = builder.add_hook::<Hooked>("preSave", "NoMethod").unwrap_err();
    assert!(matches!(err, ModelError::Configuration(_)));
}

#[tokio::test]
async fn named_hooks_resolve_when_fired() {
    let store = Arc::new(RecordingStore::default());
    let hooks = Arc::new(StaticHookRegistry::new());
    let builder = ModelBuilder::new(store).with_hook_registry(hooks.clone());

    builder.add_hook::<Hooked>("beforeValidate", "Stamp.mark").unwrap();
    let model = builder.build::<Hooked>("Named").unwrap();

    let mut instance = model.instance(json!({"name": "x"})).unwrap();
    let err = instance.validate().await.unwrap_err();
    assert!(matches!(
        err,
        ModelError::Store(StoreError::Hook(HookError::UnknownGroup { ref group })) if group == "Stamp"
    ));

    hooks.register(
        "Stamp",
        HookGroup::new().method("mark", |doc: &mut Document| {
            doc.set("num", 1);
            Ok(())
        }),
    );
    instance.validate().await.unwrap();
    assert_eq!(instance.get("num"), Some(json!(1)));
}

#[tokio::test]
async fn named_hook_with_unknown_method_fails() {
    let hooks = Arc::new(StaticHookRegistry::new());
    hooks.register("Stamp", HookGroup::new());
    let builder =
        ModelBuilder::new(Arc::new(RecordingStore::default())).with_hook_registry(hooks);

    builder.add_hook::<Hooked>("afterValidate", "Stamp.nothing").unwrap();
    let model = builder.build::<Hooked>("Named").unwrap();
    let err = model
        .instance(json!({}))
        .unwrap()
        .validate()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ModelError::Store(StoreError::Hook(HookError::UnknownMethod { .. }))
    ));
}
