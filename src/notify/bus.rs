//! Subscriber-based delivery of watch events.

use crate::notify::{EventKind, Notifier, WatchEvent};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

type Callback = Box<dyn Fn(&WatchEvent) + Send + Sync>;

struct Subscriber {
    id: usize,
    filter: Option<EventKind>,
    callback: Callback,
}

impl Subscriber {
    fn accepts(&self, kind: EventKind) -> bool {
        self.filter.is_none_or(|filter| filter == kind)
    }
}

/// Internal bus state.
struct EventBusInner {
    subscribers: ArcSwap<Vec<Arc<Subscriber>>>,
    next_id: AtomicUsize,
}

impl EventBusInner {
    fn remove(&self, id: usize) {
        self.subscribers.rcu(|subs| {
            subs.iter()
                .filter(|sub| sub.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }
}

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// Removal happens synchronously inside `drop`.
pub struct SubscriptionHandle {
    id: usize,
    bus: Weak<EventBusInner>,
}

impl SubscriptionHandle {
    /// Keep the subscription alive for as long as the bus exists.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}

/// In-process publish/subscribe channel for watch events.
///
/// Subscribers are held in a copy-on-write snapshot, so a callback may
/// subscribe or unsubscribe while an event is being delivered. Changes apply
/// from the next publish.
///
/// # Examples
///
/// ```rust
/// use attr_watch::notify::{EventBus, EventKind, Notifier, WatchEvent};
/// use attr_watch::core::ChangePayload;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let bus = EventBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
///
/// let seen_clone = Arc::clone(&seen);
/// let handle = bus.subscribe(EventKind::Change, move |_event| {
///     seen_clone.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.publish(&WatchEvent::Change(ChangePayload::new()));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// bus.publish(&WatchEvent::Change(ChangePayload::new()));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                subscribers: ArcSwap::from_pointee(Vec::new()),
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to one channel.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionHandle
    where
        F: Fn(&WatchEvent) + Send + Sync + 'static,
    {
        self.add(Some(kind), Box::new(callback))
    }

    /// Subscribe to every channel.
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&WatchEvent) + Send + Sync + 'static,
    {
        self.add(None, Box::new(callback))
    }

    /// Forward every event to another notifier.
    pub fn forward_to(&self, notifier: Arc<dyn Notifier>) -> SubscriptionHandle {
        self.add(None, Box::new(move |event| notifier.publish(event)))
    }

    fn add(&self, filter: Option<EventKind>, callback: Callback) -> SubscriptionHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            filter,
            callback,
        });
        self.inner.subscribers.rcu(|subs| {
            let mut next = Vec::clone(subs);
            next.push(Arc::clone(&subscriber));
            next
        });

        SubscriptionHandle {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load().len()
    }
}

impl Notifier for EventBus {
    /// Calls matching subscribers in the order they subscribed.
    fn publish(&self, event: &WatchEvent) {
        let kind = event.kind();
        let subscribers = self.inner.subscribers.load_full();
        for subscriber in subscribers.iter().filter(|s| s.accepts(kind)) {
            (subscriber.callback)(event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
