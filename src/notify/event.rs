//! Events published by detectors.

use crate::core::{ChangePayload, FullPayload};

/// The named channels a watcher publishes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Display key to current value.
    Change,
    /// Display key to new/old pair.
    ChangeFull,
}

impl EventKind {
    /// Stable channel name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::ChangeFull => "change:full",
        }
    }
}

/// A single notification.
#[derive(Clone, Debug, PartialEq)]
pub enum WatchEvent {
    /// Simple payload, published on `change`.
    Change(ChangePayload),
    /// Detailed payload, published on `change:full`.
    ChangeFull(FullPayload),
}

impl WatchEvent {
    /// The channel this event belongs to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Change(_) => EventKind::Change,
            Self::ChangeFull(_) => EventKind::ChangeFull,
        }
    }

    /// The simple payload, if this is a `change` event.
    pub fn as_change(&self) -> Option<&ChangePayload> {
        match self {
            Self::Change(payload) => Some(payload),
            Self::ChangeFull(_) => None,
        }
    }

    /// The detailed payload, if this is a `change:full` event.
    pub fn as_change_full(&self) -> Option<&FullPayload> {
        match self {
            Self::ChangeFull(payload) => Some(payload),
            Self::Change(_) => None,
        }
    }
}

/// Destination for watch events.
///
/// Implement this to deliver notifications somewhere other than the
/// in-process [`EventBus`](crate::notify::EventBus).
pub trait Notifier: Send + Sync {
    /// Deliver one event to every current subscriber.
    fn publish(&self, event: &WatchEvent);
}
