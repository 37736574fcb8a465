//! Error types for attr-watch.

use crate::core::{DetectionStrategy, EmissionPolicy};
use crate::object::ObjectId;
use std::time::Duration;

/// Result type alias for attr-watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur when watching attributes.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The attribute does not exist on the object at registration time.
    #[error("Attribute '{attribute}' not found on {object}")]
    AttributeNotFound {
        /// The attribute that was requested
        attribute: String,
        /// The object it was requested on
        object: ObjectId,
    },

    /// The requested detection strategy cannot follow the current one.
    #[error("Illegal detection strategy transition: {from} -> {to}")]
    IllegalStrategyTransition {
        /// Strategy in effect when the transition was requested
        from: DetectionStrategy,
        /// Strategy that was requested
        to: DetectionStrategy,
    },

    /// Registration was called with arguments it cannot interpret.
    #[error("Invalid registration arguments: {0}")]
    InvalidRegistrationArguments(String),

    /// An operation that needs a particular emission policy ran under another.
    #[error("Operation '{operation}' is invalid under emission policy {policy}")]
    InvalidModeOperation {
        /// Name of the internal operation
        operation: &'static str,
        /// Emission policy in effect
        policy: EmissionPolicy,
    },

    /// The requested poll interval is longer than the timer supports.
    #[error("Poll interval {interval:?} exceeds the maximum of {max:?}")]
    InvalidPollInterval {
        /// Interval that was requested
        interval: Duration,
        /// Longest accepted interval
        max: Duration,
    },

    /// Polling was requested outside a tokio runtime.
    #[error("Polling requires a running tokio runtime")]
    NoRuntime,

    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings could not be loaded or deserialized.
    #[error("Failed to load settings: {0}")]
    SettingsLoad(String),
}
