//! Example demonstrating both detection strategies.
//!
//! This example shows how to:
//! - Watch attributes under remapped display keys
//! - Receive polled `change` notifications
//! - Switch to interception and receive `change:full` notifications
//!
//! Run with: cargo run --example watch_object

use attr_watch::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Attribute Watch Example ===\n");

    let primary = Object::with_attributes([("status", Value::from("starting")), ("load", Value::from(0))]);
    let replica = Object::with_attributes([("status", "starting")]);

    let watcher = AttrWatcher::builder()
        .with_emission_policy(EmissionPolicy::ChangedOnly)
        .build()?;

    watcher.watch_batch(&primary, [("status", "primaryStatus"), ("load", "primaryLoad")])?;
    watcher.watch_as(&replica, "status", "replicaStatus")?;

    let _change = watcher.subscribe(EventKind::Change, |event| {
        if let Some(payload) = event.as_change() {
            let rendered: Vec<String> = payload.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!("[change] {}", rendered.join(", "));
        }
    });
    let _full = watcher.subscribe(EventKind::ChangeFull, |event| {
        if let Some(payload) = event.as_change_full() {
            for (key, change) in payload.iter() {
                println!("[change:full] {key}: {} -> {}", change.old, change.new);
            }
        }
    });

    println!("Polling every 50ms...");
    watcher.start_polling(Duration::from_millis(50))?;

    primary.set("status", "ready");
    tokio::time::sleep(Duration::from_millis(80)).await;
    replica.set("status", "ready");
    primary.set("load", 3);
    tokio::time::sleep(Duration::from_millis(80)).await;

    println!("\nSwitching to interception...");
    watcher.start_intercepting();

    primary.set("load", 7);
    replica.set("status", "lagging");

    println!("\nSnapshotting every entry on each write...");
    watcher.set_emission_policy(EmissionPolicy::All);
    primary.set("status", "draining");

    match watcher.start_polling(Duration::from_millis(50)) {
        Err(e) => println!("\nPolling refused: {e}"),
        Ok(()) => println!("\nPolling unexpectedly restarted"),
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
