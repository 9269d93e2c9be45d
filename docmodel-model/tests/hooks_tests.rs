use async_trait::async_trait;
use docmodel_model::hooks::{from_fn, run_middleware};
use docmodel_model::{
    Hook, HookError, HookGroup, HookHandler, HookMethod, HookReference, HookRegistry, HookSignal,
    Middleware, Next, StaticHookRegistry,
};
use docmodel_types::Document;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn push_marker(marker: &'static str) -> Middleware {
    from_fn(move |doc: &mut Document, next: Next| {
        let mut seen = doc
            .get("seen")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        seen.push(marker.into());
        doc.set("seen", seen);
        next.done()
    })
}

// ── References ───────────────────────────────────────────────────

#[test]
fn reference_splits_group_and_method() {
    let r = HookReference::parse("UserHook.hashPassword").unwrap();
    assert_eq!(r.group, "UserHook");
    assert_eq!(r.method, "hashPassword");
    assert_eq!(r.to_string(), "UserHook.hashPassword");
}

#[test]
fn reference_with_dotted_group_splits_at_last_dot() {
    let r = HookReference::parse("App.Hooks.Token.touch").unwrap();
    assert_eq!(r.group, "App.Hooks.Token");
    assert_eq!(r.method, "touch");
}

#[test]
fn malformed_references_are_rejected() {
    for bad in ["", "NoDot", ".method", "Group."] {
        assert_eq!(
            HookReference::parse(bad),
            Err(HookError::MalformedReference(bad.to_string())),
            "{bad:?}"
        );
    }
}

#[test]
fn strings_convert_to_named_handlers() {
    assert!(matches!(HookHandler::from("A.b"), HookHandler::Named(r) if r == "A.b"));
    assert!(matches!(HookHandler::from(String::from("A.b")), HookHandler::Named(_)));
    assert!(matches!(HookHandler::inline(|_, next| next.done()), HookHandler::Inline(_)));
}

// ── Registry ─────────────────────────────────────────────────────

#[tokio::test]
async fn registry_lookup_after_registration() {
    let registry = StaticHookRegistry::new();
    assert!(registry.lookup("UserHook").is_none());

    registry.register(
        "UserHook",
        HookGroup::new().method("lower", |doc: &mut Document| {
            let lowered = doc.get_str("email").map(str::to_lowercase);
            if let Some(email) = lowered {
                doc.set("email", email);
            }
            Ok(())
        }),
    );

    let group = registry.lookup("UserHook").unwrap();
    let method = group.get("lower").unwrap();
    assert!(group.get("missing").is_none());

    let mut doc: Document = [("email", "A@B.C")].into_iter().collect();
    method.call(&mut doc).await.unwrap();
    assert_eq!(doc.get_str("email"), Some("a@b.c"));
}

#[test]
fn registering_a_group_again_replaces_it() {
    let registry = StaticHookRegistry::new();
    registry.register("G", HookGroup::new().method("a", |_| Ok(())));
    registry.register("G", HookGroup::new().method("b", |_| Ok(())));

    let group = registry.lookup("G").unwrap();
    assert!(group.get("a").is_none());
    assert!(group.get("b").is_some());
}

// ── Running middleware ───────────────────────────────────────────

#[tokio::test]
async fn middleware_runs_in_registration_order() {
    let callbacks = vec![push_marker("first"), push_marker("second"), push_marker("third")];
    let mut doc = Document::new();
    run_middleware(&callbacks, &mut doc).await.unwrap();
    assert_eq!(
        doc.get("seen"),
        Some(&serde_json::json!(["first", "second", "third"]))
    );
}

#[tokio::test]
async fn middleware_stops_at_first_failure() {
    let failing = from_fn(|_: &mut Document, next: Next| next.fail("nope"));
    let callbacks = vec![push_marker("first"), failing, push_marker("never")];

    let mut doc = Document::new();
    let err = run_middleware(&callbacks, &mut doc).await.unwrap_err();
    assert_eq!(err, HookError::Failed("nope".into()));
    assert_eq!(doc.get("seen"), Some(&serde_json::json!(["first"])));
}

#[tokio::test]
async fn next_result_forwards_outcome() {
    let forwarding = from_fn(|doc: &mut Document, next: Next| {
        let outcome = if doc.contains("ok") {
            Ok(())
        } else {
            Err(HookError::Failed("missing ok".into()))
        };
        next.result(outcome)
    });

    let mut doc: Document = [("ok", true)].into_iter().collect();
    assert!(run_middleware(std::slice::from_ref(&forwarding), &mut doc).await.is_ok());
    assert!(run_middleware(&[forwarding], &mut Document::new()).await.is_err());
}

#[tokio::test]
async fn empty_stack_is_a_no_op() {
    let mut doc = Document::new();
    run_middleware(&[], &mut doc).await.unwrap();
    assert!(doc.is_empty());
}

// ── Awaiting hooks ───────────────────────────────────────────────

struct DelayedStamp;

#[async_trait]
impl Hook for DelayedStamp {
    async fn call(&self, doc: &mut Document, next: Next) -> HookSignal {
        tokio::time::sleep(Duration::from_millis(5)).await;
        doc.set("stamped", true);
        next.done()
    }
}

#[tokio::test]
async fn awaiting_hook_finishes_before_the_next_one() {
    let HookHandler::Inline(delayed) = HookHandler::hook(DelayedStamp) else {
        panic!("expected an inline handler");
    };
    let check = from_fn(|doc: &mut Document, next: Next| {
        if doc.get_bool("stamped") == Some(true) {
            next.done()
        } else {
            next.fail("ran before the stamp")
        }
    });

    let mut doc = Document::new();
    run_middleware(&[delayed, check], &mut doc).await.unwrap();
    assert_eq!(doc.get_bool("stamped"), Some(true));
}

struct SpawnedUpper;

#[async_trait]
impl HookMethod for SpawnedUpper {
    async fn call(&self, doc: &mut Document) -> Result<(), HookError> {
        let name = doc.get_str("name").unwrap_or_default().to_string();
        let upper = tokio::task::spawn_blocking(move || name.to_uppercase())
            .await
            .map_err(|e| HookError::Failed(e.to_string()))?;
        doc.set("name", upper);
        Ok(())
    }
}

#[tokio::test]
async fn async_group_methods_are_awaited() {
    let registry = StaticHookRegistry::new();
    registry.register("Names", HookGroup::new().async_method("upper", SpawnedUpper));

    let method = registry.lookup("Names").unwrap().get("upper").unwrap();
    let mut doc: Document = [("name", "ada")].into_iter().collect();
    method.call(&mut doc).await.unwrap();
    assert_eq!(doc.get_str("name"), Some("ADA"));
}
