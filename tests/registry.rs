//! Integration tests for registration and unregistration.

use attr_watch::core::Detection;
use attr_watch::prelude::*;

#[test]
fn test_cached_value_matches_attribute_after_registration() {
    let obj = Object::with_attributes([
        ("name", Value::from("svc")),
        ("port", Value::from(8080)),
        ("ratio", Value::from(0.5)),
        ("enabled", Value::from(true)),
    ]);
    let watcher = AttrWatcher::new();
    watcher
        .watch_batch(&obj, obj.attribute_names())
        .unwrap();

    for name in obj.attribute_names() {
        assert_eq!(watcher.cached_value(&obj, &name), obj.get(&name), "{name}");
    }
}

#[test]
fn test_missing_attribute_leaves_registry_unchanged() {
    let obj = Object::with_attributes([("a", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch(&obj, "a").unwrap();

    let err = watcher.watch(&obj, "b").unwrap_err();
    match err {
        WatchError::AttributeNotFound { attribute, object } => {
            assert_eq!(attribute, "b");
            assert_eq!(object, obj.id());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(watcher.len(), 1);
}

#[test]
fn test_batch_failure_adds_nothing() {
    let obj = Object::with_attributes([("a", 1), ("c", 3)]);
    let watcher = AttrWatcher::new();

    let result = watcher.watch_batch(&obj, ["a", "b", "c"]);
    assert!(matches!(result, Err(WatchError::AttributeNotFound { .. })));
    assert!(watcher.is_empty());
    assert!(!watcher.is_watching(&obj));
}

#[test]
fn test_batch_with_display_keys() {
    let obj = Object::with_attributes([("status", Value::from("ok")), ("load", Value::from(3))]);
    let watcher = AttrWatcher::new();

    let added = watcher
        .watch_batch(
            &obj,
            [
                AttrSpec::from(("status", "svcStatus")),
                AttrSpec::from("load"),
            ],
        )
        .unwrap();

    assert_eq!(added, 2);
    assert_eq!(watcher.watched_keys(), vec!["svcStatus", "load"]);
}

#[test]
fn test_unrecognized_arguments_rejected() {
    let obj = Object::with_attributes([("a", 1)]);
    let watcher = AttrWatcher::new();

    let empty: [&str; 0] = [];
    assert!(matches!(
        watcher.watch_batch(&obj, empty),
        Err(WatchError::InvalidRegistrationArguments(_))
    ));
    assert!(matches!(
        watcher.watch(&obj, ""),
        Err(WatchError::InvalidRegistrationArguments(_))
    ));
    assert!(watcher.is_empty());
}

#[test]
fn test_unwatch_removes_all_entries_of_object() {
    let a = Object::with_attributes([("x", 1), ("y", 2)]);
    let b = Object::with_attributes([("x", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch_batch(&a, ["x", "y"]).unwrap();
    watcher.watch_as(&b, "x", "bx").unwrap();

    assert_eq!(watcher.unwatch_object(&a), 2);
    assert!(!watcher.is_watching(&a));
    assert!(watcher.is_watching(&b));
    assert_eq!(watcher.unwatch_object(&a), 0);
}

#[test]
fn test_unwatch_compares_identity_not_contents() {
    let a = Object::with_attributes([("x", 1)]);
    let twin = Object::with_attributes([("x", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch(&a, "x").unwrap();

    assert_eq!(watcher.unwatch_object(&twin), 0);
    assert_eq!(watcher.len(), 1);
}

#[test]
fn test_same_attribute_watched_twice() {
    let obj = Object::with_attributes([("status", "ok")]);
    let watcher = AttrWatcher::new();
    watcher.watch_as(&obj, "status", "s1").unwrap();
    watcher.watch_as(&obj, "status", "s2").unwrap();
    assert_eq!(watcher.len(), 2);
}

#[test]
fn test_new_entries_are_unwatched_until_a_strategy_runs() {
    let obj = Object::with_attributes([("a", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch(&obj, "a").unwrap();
    assert_eq!(watcher.detection(&obj, "a"), Some(Detection::Unwatched));
    assert_eq!(watcher.strategy(), DetectionStrategy::Idle);
}
