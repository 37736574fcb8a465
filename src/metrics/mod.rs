//! Built-in metrics for detection activity.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Poll passes and their duration
//! - Intercepted writes
//! - Published notifications per channel
//! - Active and reclaimed entries
//!
//! # Examples
//!
//! ```rust,no_run
//! use attr_watch::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let meter = global::meter("my-app");
//!
//! let watcher = AttrWatcher::builder()
//!     .with_metrics(meter)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod watch_metrics;

pub use watch_metrics::WatchMetrics;
