//! Change notification system.
//!
//! Provides the event channels detectors publish to and the diagnostic
//! side channel.

pub mod bus;
pub mod diagnostics;
mod event;

pub use bus::{EventBus, SubscriptionHandle};
pub use diagnostics::{Diagnostic, DiagnosticSink, INTERCEPT_PERMANENT, TracingDiagnostics};
pub use event::{EventKind, Notifier, WatchEvent};
