//! Integration tests for poll-based detection.

use attr_watch::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn record(watcher: &AttrWatcher) -> (Arc<Mutex<Vec<WatchEvent>>>, SubscriptionHandle) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    let handle = watcher.subscribe_all(move |event| {
        events_clone.lock().push(event.clone());
    });
    (events, handle)
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_changed_only_ignores_same_value() {
    let obj = Object::with_attributes([("value", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch_as(&obj, "value", "v").unwrap();
    let (events, _handle) = record(&watcher);

    watcher.start_polling(Duration::from_millis(100)).unwrap();

    obj.set("value", 1);
    advance(150).await;
    assert!(events.lock().is_empty());

    obj.set("value", 2);
    advance(100).await;
    let events = events.lock();
    assert_eq!(events.len(), 1);
    let payload = events[0].as_change().unwrap();
    assert_eq!(payload.len(), 1);
    assert_eq!(payload.get("v"), Some(&Value::Int(2)));
}

#[tokio::test(start_paused = true)]
async fn test_all_policy_includes_every_entry() {
    let obj = Object::with_attributes([("a", 1), ("b", 2)]);
    let watcher = AttrWatcher::new();
    watcher.watch_batch(&obj, ["a", "b"]).unwrap();
    watcher.set_emission_policy(EmissionPolicy::All);
    watcher.start_polling(Duration::from_millis(100)).unwrap();
    let (events, _handle) = record(&watcher);

    obj.set("a", 3);
    advance(150).await;

    let events = events.lock();
    assert_eq!(events.len(), 1);
    let payload = events[0].as_change().unwrap();
    assert_eq!(payload.get("a"), Some(&Value::Int(3)));
    assert_eq!(payload.get("b"), Some(&Value::Int(2)));
}

#[tokio::test(start_paused = true)]
async fn test_poll_never_publishes_detailed_payload() {
    let obj = Object::with_attributes([("a", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch(&obj, "a").unwrap();
    let (events, _handle) = record(&watcher);
    watcher.start_polling(Duration::from_millis(10)).unwrap();

    // Stay between ticks so every write is seen by exactly one pass.
    advance(5).await;
    for n in 2..6 {
        obj.set("a", n);
        advance(10).await;
    }

    let events = events.lock();
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.kind() == EventKind::Change));
}

#[tokio::test(start_paused = true)]
async fn test_policy_switch_applies_next_pass() {
    let obj = Object::with_attributes([("a", 1), ("b", 2)]);
    let watcher = AttrWatcher::new();
    watcher.watch_batch(&obj, ["a", "b"]).unwrap();
    let (events, _handle) = record(&watcher);
    watcher.start_polling(Duration::from_millis(100)).unwrap();

    obj.set("a", 5);
    advance(150).await;
    watcher.set_emission_policy(EmissionPolicy::All);
    advance(100).await;

    let events = events.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].as_change().unwrap().len(), 1);
    assert_eq!(events[1].as_change().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_timer() {
    let obj = Object::with_attributes([("a", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch(&obj, "a").unwrap();
    watcher.set_emission_policy(EmissionPolicy::All);
    let (events, _handle) = record(&watcher);

    watcher.start_polling(Duration::from_millis(100)).unwrap();
    watcher.start_polling(Duration::from_millis(250)).unwrap();
    assert_eq!(watcher.poll_interval(), Some(Duration::from_millis(250)));

    // Ticks at 250, 500, 750 and 1000ms only.
    advance(1100).await;
    assert_eq!(events.lock().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_stop_polling_prevents_ticks() {
    let obj = Object::with_attributes([("a", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch(&obj, "a").unwrap();
    let (events, _handle) = record(&watcher);
    watcher.start_polling(Duration::from_millis(50)).unwrap();

    watcher.stop_polling();
    obj.set("a", 2);
    advance(500).await;
    assert!(events.lock().is_empty());
    assert_eq!(watcher.strategy(), DetectionStrategy::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_unwatched_object_stays_silent() {
    let a = Object::with_attributes([("x", 1)]);
    let b = Object::with_attributes([("x", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch_as(&a, "x", "ax").unwrap();
    watcher.watch_as(&b, "x", "bx").unwrap();
    let (events, _handle) = record(&watcher);
    watcher.start_polling(Duration::from_millis(100)).unwrap();

    assert_eq!(watcher.unwatch_object(&a), 1);
    a.set("x", 10);
    b.set("x", 20);
    advance(150).await;

    let events = events.lock();
    assert_eq!(events.len(), 1);
    let payload = events[0].as_change().unwrap();
    assert!(payload.get("ax").is_none());
    assert_eq!(payload.get("bx"), Some(&Value::Int(20)));
}

#[tokio::test(start_paused = true)]
async fn test_display_keys_disambiguate() {
    let first = Object::with_attributes([("status", "up")]);
    let second = Object::with_attributes([("status", "down")]);
    let watcher = AttrWatcher::new();
    watcher.watch_as(&first, "status", "statusA").unwrap();
    watcher.watch_as(&second, "status", "statusB").unwrap();
    watcher.set_emission_policy(EmissionPolicy::All);
    let (events, _handle) = record(&watcher);
    watcher.start_polling(Duration::from_millis(100)).unwrap();

    advance(150).await;

    let events = events.lock();
    let payload = events[0].as_change().unwrap();
    assert_eq!(payload.get("statusA"), Some(&Value::from("up")));
    assert_eq!(payload.get("statusB"), Some(&Value::from("down")));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_object_is_reclaimed() {
    let keep = Object::with_attributes([("x", 1)]);
    let gone = Object::with_attributes([("x", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch_as(&keep, "x", "keep").unwrap();
    watcher.watch_as(&gone, "x", "gone").unwrap();
    watcher.set_emission_policy(EmissionPolicy::All);
    let (events, _handle) = record(&watcher);
    watcher.start_polling(Duration::from_millis(100)).unwrap();

    drop(gone);
    advance(150).await;

    assert_eq!(watcher.len(), 1);
    assert_eq!(watcher.watched_keys(), vec!["keep".to_string()]);
    let events = events.lock();
    assert_eq!(events[0].as_change().unwrap().keys().collect::<Vec<_>>(), vec!["keep"]);
}

#[tokio::test(start_paused = true)]
async fn test_entries_registered_while_polling_are_polled() {
    let obj = Object::with_attributes([("late", 1)]);
    let watcher = AttrWatcher::new();
    let (events, _handle) = record(&watcher);
    watcher.start_polling(Duration::from_millis(100)).unwrap();

    watcher.watch(&obj, "late").unwrap();
    obj.set("late", 2);
    advance(150).await;

    assert_eq!(events.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_default_interval_from_settings() {
    let obj = Object::with_attributes([("a", 1)]);
    let watcher = AttrWatcher::builder()
        .with_poll_interval(Duration::from_millis(40))
        .build()
        .unwrap();
    watcher.watch(&obj, "a").unwrap();
    watcher.start_default_polling().unwrap();
    assert_eq!(watcher.poll_interval(), Some(Duration::from_millis(40)));
}

#[tokio::test(start_paused = true)]
async fn test_timer_exits_when_watcher_dropped() {
    let obj = Object::with_attributes([("a", 1)]);
    let watcher = AttrWatcher::new();
    watcher.watch(&obj, "a").unwrap();
    let (events, handle) = record(&watcher);
    watcher.start_polling(Duration::from_millis(10)).unwrap();

    drop(watcher);
    obj.set("a", 2);
    advance(100).await;
    assert!(events.lock().is_empty());
    drop(handle);
}
