//! Public-API checks for the key codec and listener registry

use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

use scopekv_core::{
    EventFilter, EventListener, EventOperation, KvError, KvEvent, ListenerRegistry, Scope,
    ScopedKey, UNPARSEABLE_KEY,
};

#[test]
fn test_codec_round_trips_colon_free_keys() {
    let cases = [
        ScopedKey::new("greeting", Scope::Workflow, "7"),
        ScopedKey::new("counter", Scope::Execution, "exec-1"),
        ScopedKey::new("token", Scope::Instance, ""),
        ScopedKey::new("wide", Scope::All, ""),
    ];

    for scoped in cases {
        let encoded = scoped.encode();
        assert_eq!(encoded.parse::<ScopedKey>().unwrap(), scoped, "{}", encoded);
    }
}

#[test]
fn test_codec_rejects_foreign_strings() {
    assert!(matches!(
        ScopedKey::decode("session:abc"),
        Err(KvError::MalformedScopedKey(_))
    ));
    assert!(matches!(
        ScopedKey::decode("scope:GLOBAL-1:k"),
        Err(KvError::UnknownScope(_))
    ));
    assert_eq!(ScopedKey::decode_key_lossy("garbage"), UNPARSEABLE_KEY);
}

#[test]
fn test_registry_fans_out_in_order() {
    let registry = ListenerRegistry::new();
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));

    let tag = |name: &'static str| -> Arc<dyn EventListener> {
        let seen = seen.clone();
        Arc::new(move |event: &KvEvent| {
            seen.lock().unwrap().push(format!("{}:{}", name, event.key));
        })
    };

    registry
        .add(Scope::Workflow, "7", EventFilter::Any, tag("wf7"))
        .unwrap();
    registry.add(Scope::All, "", EventFilter::Any, tag("all")).unwrap();
    registry
        .add(
            Scope::Workflow,
            "7,8",
            EventFilter::only([EventOperation::Deleted]),
            tag("wf-deletes"),
        )
        .unwrap();

    let key = ScopedKey::new("greeting", Scope::Workflow, "7");
    assert_eq!(registry.dispatch(&KvEvent::written(&key, "hi", None, None)), 2);
    assert_eq!(registry.dispatch(&KvEvent::deleted(&key, Some("hi".to_string()))), 3);

    let other = ScopedKey::new("x", Scope::Workflow, "8");
    assert_eq!(registry.dispatch(&KvEvent::written(&other, "1", None, None)), 1);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "all:greeting",
            "wf7:greeting",
            "all:greeting",
            "wf7:greeting",
            "wf-deletes:greeting",
            "all:x",
        ]
    );
}

#[test]
fn test_registry_rejects_non_numeric_workflow_specifier() {
    let registry = ListenerRegistry::new();
    let listener: Arc<dyn EventListener> = Arc::new(|_: &KvEvent| {});

    let result = registry.add(Scope::Workflow, "7,abc", EventFilter::Any, listener);
    assert_eq!(result.unwrap_err(), KvError::InvalidWorkflowId("abc".to_string()));
    assert!(registry.is_empty());
}
