//! # attr-watch
//!
//! Change notifications for attributes of live objects that do not
//! cooperate with being watched.
//!
//! ## Overview
//!
//! `attr-watch` keeps a registry of watched attributes and discovers changes
//! with one of two strategies:
//! - **Polling**: a tokio timer re-reads every attribute and compares it
//!   against the cached value
//! - **Interception**: each attribute's storage is replaced by an accessor
//!   that reports writes synchronously, before the assignment returns
//!
//! Watched objects are held weakly. When one is dropped, its entries are
//! removed from the registry.
//!
//! ## Quick Start
//!
//! ```rust
//! use attr_watch::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> attr_watch::error::Result<()> {
//! let job = Object::with_attributes([("status", Value::from("queued")), ("progress", Value::from(0))]);
//!
//! let watcher = AttrWatcher::new();
//! watcher.watch_batch(&job, ["status", "progress"])?;
//!
//! let _handle = watcher.subscribe(EventKind::Change, |event| {
//!     if let Some(payload) = event.as_change() {
//!         for (key, value) in payload.iter() {
//!             println!("{key} -> {value}");
//!         }
//!     }
//! });
//!
//! watcher.start_polling(Duration::from_millis(100))?;
//! job.set("status", "running");
//! # Ok(())
//! # }
//! ```
//!
//! ## Emission policies
//!
//! - [`EmissionPolicy::ChangedOnly`](core::EmissionPolicy::ChangedOnly):
//!   payloads carry only entries whose value changed
//! - [`EmissionPolicy::All`](core::EmissionPolicy::All): payloads carry every
//!   watched entry on every detection pass
//!
//! ## Feature Flags
//!
//! - `yaml`, `toml`, `json` (default): settings file formats
//! - `metrics`: OpenTelemetry metrics for detection activity

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
mod detect;
pub mod error;
pub mod notify;
pub mod object;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        AttrSpec, AttrWatcher, AttrWatcherBuilder, ChangePayload, DetectionStrategy,
        EmissionPolicy, FullPayload, ValueChange, WatchSettings,
    };
    pub use crate::error::{Result, WatchError};
    pub use crate::notify::{EventKind, Notifier, SubscriptionHandle, WatchEvent};
    pub use crate::object::{Object, SharedRef, Value};
}
