//! The main watcher handle.

use crate::core::mode::ModeSelector;
use crate::core::registry::Registry;
use crate::core::{
    AttrSpec, Detection, DetectionStrategy, EmissionPolicy, MAX_POLL_INTERVAL, WatchSettings,
};
use crate::detect::intercept::{self, InterceptAccessor};
use crate::detect::poll::{self, PollTimer};
use crate::error::{Result, WatchError};
use crate::notify::{
    Diagnostic, DiagnosticSink, EventBus, EventKind, INTERCEPT_PERMANENT, Notifier,
    SubscriptionHandle, TracingDiagnostics, WatchEvent,
};
use crate::object::{Object, Value};
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

/// Everything guarded by the watcher's single lock.
pub(crate) struct EngineState {
    registry: Registry,
    mode: ModeSelector,
    poll: Option<PollTimer>,
    poll_generation: u64,
}

/// State shared between the handle, the poll task and installed accessors.
///
/// Lock order: `delivery`, then `state`, then object and accessor locks.
/// `delivery` is held from detection through publication, so passes are
/// published in the order they were detected. It is reentrant, so a
/// subscriber may write a watched attribute from inside its callback.
pub(crate) struct Shared {
    delivery: ReentrantMutex<()>,
    state: Mutex<EngineState>,
    bus: EventBus,
    diagnostics: Arc<dyn DiagnosticSink>,
    settings: WatchSettings,
    #[cfg(feature = "metrics")]
    metrics: Option<WatchMetrics>,
}

impl Shared {
    /// Run one poll pass for timer `generation`.
    ///
    /// Returns false if that timer has been replaced or stopped.
    pub(crate) fn run_poll_pass(&self, generation: u64) -> bool {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        let _delivery = self.delivery.lock();
        let (payload, retained) = {
            let mut state = self.state.lock();
            if state.poll.as_ref().map(PollTimer::generation) != Some(generation) {
                return false;
            }
            self.purge(&mut state);
            let policy = state.mode.policy();
            let payload = poll::detect(&mut state.registry, policy);
            (payload, state.registry.take_retained())
        };
        drop(retained);

        tracing::trace!(generation, changed = payload.len(), "poll pass");
        if !payload.is_empty() {
            self.publish(vec![WatchEvent::Change(payload)]);
        }

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_poll_pass(started);
        }
        true
    }

    /// Store a write through `accessor` and publish what it changed.
    ///
    /// The compare, the store and detection happen under the state lock;
    /// publication happens after it is released but before `delivery` is.
    pub(crate) fn handle_intercepted_write(&self, accessor: &InterceptAccessor, value: Value) {
        let _delivery = self.delivery.lock();
        let object = accessor.object();
        let attribute = accessor.attribute();
        let (result, retained) = {
            let mut state = self.state.lock();
            if !accessor.store(&value) {
                return;
            }
            if state.mode.strategy() != DetectionStrategy::Intercept {
                return;
            }
            self.purge(&mut state);
            let policy = state.mode.policy();
            let result = intercept::detect(&mut state.registry, policy, object, attribute, &value);
            (result, state.registry.take_retained())
        };
        drop(retained);

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_intercepted_write();
        }

        match result {
            Ok(events) => self.publish(events),
            Err(e) => {
                tracing::error!(%object, attribute, error = %e, "intercepted write dropped");
            }
        }
    }

    fn purge(&self, state: &mut EngineState) -> usize {
        let reclaimed = state.registry.purge_reclaimed();

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            metrics.record_reclaimed(reclaimed);
            metrics.update_entry_count(state.registry.len());
        }
        reclaimed
    }

    /// Publish in order. Must be called without the state lock held.
    fn publish(&self, events: Vec<WatchEvent>) {
        for event in &events {
            #[cfg(feature = "metrics")]
            if let Some(metrics) = &self.metrics {
                metrics.record_notification(event.kind());
            }

            self.bus.publish(event);
        }
    }
}

/// Collaborators a watcher is assembled from.
pub(crate) struct WatcherParts {
    pub(crate) settings: WatchSettings,
    pub(crate) diagnostics: Arc<dyn DiagnosticSink>,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<WatchMetrics>,
}

impl Default for WatcherParts {
    fn default() -> Self {
        Self {
            settings: WatchSettings::default(),
            diagnostics: Arc::new(TracingDiagnostics),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }
}

/// Watches attributes of live objects and publishes change notifications.
///
/// Cheap to clone; clones share the same registry and channels. Objects are
/// held weakly, so watching never keeps an object alive.
///
/// Exactly one detection strategy is active at a time. Polling may be
/// re-armed freely; interception is permanent and cannot be followed by
/// polling.
///
/// # Examples
///
/// ```rust
/// use attr_watch::prelude::*;
/// use std::sync::Arc;
/// use parking_lot::Mutex;
///
/// # fn main() -> attr_watch::error::Result<()> {
/// let watcher = AttrWatcher::new();
/// let user = Object::with_attributes([("name", "Ada")]);
/// watcher.watch_as(&user, "name", "n")?;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let seen_clone = Arc::clone(&seen);
/// let _handle = watcher.subscribe(EventKind::Change, move |event| {
///     seen_clone.lock().push(event.clone());
/// });
///
/// watcher.start_intercepting();
/// user.set("name", "Grace");
///
/// // Delivered before `set` returned.
/// let seen = seen.lock();
/// assert_eq!(seen[0].as_change().unwrap().get("n"), Some(&Value::from("Grace")));
/// # Ok(())
/// # }
/// ```
pub struct AttrWatcher {
    shared: Arc<Shared>,
}

impl AttrWatcher {
    /// Create a watcher with default settings.
    ///
    /// For file or environment settings, use `AttrWatcher::builder()`.
    pub fn new() -> Self {
        Self::from_parts(WatcherParts::default())
    }

    pub(crate) fn from_parts(parts: WatcherParts) -> Self {
        let WatcherParts {
            settings,
            diagnostics,
            #[cfg(feature = "metrics")]
            metrics,
        } = parts;

        Self {
            shared: Arc::new(Shared {
                delivery: ReentrantMutex::new(()),
                state: Mutex::new(EngineState {
                    registry: Registry::new(),
                    mode: ModeSelector::new(settings.emission_policy),
                    poll: None,
                    poll_generation: 0,
                }),
                bus: EventBus::new(),
                diagnostics,
                settings,
                #[cfg(feature = "metrics")]
                metrics,
            }),
        }
    }

    /// Watch one attribute under its own name.
    ///
    /// The attribute's current value becomes the cached value.
    ///
    /// # Arguments
    ///
    /// * `object` - The object to watch; held weakly
    /// * `attribute` - Name of an attribute the object has now
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::AttributeNotFound`] if the object has no such
    /// attribute right now.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use attr_watch::prelude::*;
    ///
    /// let watcher = AttrWatcher::new();
    /// let job = Object::with_attributes([("status", "queued")]);
    ///
    /// watcher.watch(&job, "status").unwrap();
    /// assert_eq!(watcher.cached_value(&job, "status"), Some(Value::from("queued")));
    ///
    /// assert!(watcher.watch(&job, "owner").is_err());
    /// ```
    pub fn watch(&self, object: &Arc<Object>, attribute: &str) -> Result<()> {
        self.watch_batch(object, [AttrSpec::new(attribute)])
            .map(|_| ())
    }

    /// Watch one attribute, reporting it under `display_key`.
    ///
    /// Use distinct keys when watching the same attribute name on several
    /// objects; colliding keys overwrite each other in a payload.
    ///
    /// # Arguments
    ///
    /// * `object` - The object to watch; held weakly
    /// * `attribute` - Name of an attribute the object has now
    /// * `display_key` - Key used for this entry in payloads
    ///
    /// # Examples
    ///
    /// ```rust
    /// use attr_watch::prelude::*;
    ///
    /// let watcher = AttrWatcher::new();
    /// let primary = Object::with_attributes([("status", "up")]);
    /// let replica = Object::with_attributes([("status", "up")]);
    ///
    /// watcher.watch_as(&primary, "status", "primaryStatus").unwrap();
    /// watcher.watch_as(&replica, "status", "replicaStatus").unwrap();
    /// assert_eq!(watcher.watched_keys(), vec!["primaryStatus", "replicaStatus"]);
    /// ```
    pub fn watch_as(&self, object: &Arc<Object>, attribute: &str, display_key: &str) -> Result<()> {
        self.watch_batch(object, [AttrSpec::new(attribute).with_display_key(display_key)])
            .map(|_| ())
    }

    /// Watch several attributes of one object.
    ///
    /// Every attribute is checked before anything is registered: on error no
    /// entry is added, and the error names the first bad attribute.
    ///
    /// Entries registered after [`start_intercepting`](Self::start_intercepting)
    /// are not detected until it is called again.
    ///
    /// # Arguments
    ///
    /// * `object` - The object to watch; held weakly
    /// * `specs` - Attribute names, `(attribute, display_key)` pairs or
    ///   [`AttrSpec`] values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `specs` is empty, or a name or key is empty
    ///   ([`WatchError::InvalidRegistrationArguments`])
    /// - An attribute does not exist ([`WatchError::AttributeNotFound`])
    ///
    /// # Examples
    ///
    /// ```rust
    /// use attr_watch::prelude::*;
    ///
    /// let watcher = AttrWatcher::new();
    /// let job = Object::with_attributes([("status", Value::from("queued")), ("progress", Value::from(0))]);
    ///
    /// assert_eq!(watcher.watch_batch(&job, ["status", "progress"]).unwrap(), 2);
    ///
    /// // One missing attribute rejects the whole batch.
    /// let other = Object::with_attributes([("status", "queued")]);
    /// assert!(watcher.watch_batch(&other, ["status", "progress"]).is_err());
    /// assert!(!watcher.is_watching(&other));
    /// ```
    pub fn watch_batch<I>(&self, object: &Arc<Object>, specs: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<AttrSpec>,
    {
        let specs: Vec<AttrSpec> = specs.into_iter().map(Into::into).collect();
        let mut state = self.shared.state.lock();
        self.shared.purge(&mut state);
        let detection = state.mode.detection_for_new_entry();
        let added = state.registry.register_batch(object, &specs, detection)?;

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.shared.metrics {
            metrics.update_entry_count(state.registry.len());
        }
        Ok(added)
    }

    /// Stop watching every attribute of `object`. Returns how many entries were removed.
    ///
    /// Accessors already installed on the object stay in place but no
    /// longer report anything.
    pub fn unwatch_object(&self, object: &Arc<Object>) -> usize {
        let mut state = self.shared.state.lock();
        self.shared.purge(&mut state);
        let removed = state.registry.unregister_object(object);

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.shared.metrics {
            metrics.update_entry_count(state.registry.len());
        }
        removed
    }

    /// True if any attribute of `object` is watched.
    pub fn is_watching(&self, object: &Arc<Object>) -> bool {
        let mut state = self.shared.state.lock();
        self.shared.purge(&mut state);
        state.registry.contains_object(object)
    }

    /// Number of watched entries, after dropping entries of reclaimed objects.
    pub fn len(&self) -> usize {
        let mut state = self.shared.state.lock();
        self.shared.purge(&mut state);
        state.registry.len()
    }

    /// True if nothing is watched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display keys of all entries in registration order.
    pub fn watched_keys(&self) -> Vec<String> {
        let mut state = self.shared.state.lock();
        self.shared.purge(&mut state);
        state
            .registry
            .entries()
            .iter()
            .map(|e| e.display_key.clone())
            .collect()
    }

    /// The value cached for `object.attribute` by the last detection pass.
    pub fn cached_value(&self, object: &Arc<Object>, attribute: &str) -> Option<Value> {
        self.shared.state.lock().registry.cached_value(object, attribute)
    }

    /// Detection capability of `object.attribute`, if watched.
    pub fn detection(&self, object: &Arc<Object>, attribute: &str) -> Option<Detection> {
        let state = self.shared.state.lock();
        state
            .registry
            .entries()
            .iter()
            .find(|e| e.points_at(object) && e.attribute == attribute)
            .map(|e| e.detection)
    }

    /// Change what payloads contain. Applies from the next detection pass.
    pub fn set_emission_policy(&self, policy: EmissionPolicy) {
        self.shared.state.lock().mode.set_policy(policy);
        tracing::debug!(%policy, "emission policy changed");
    }

    /// The current emission policy.
    pub fn emission_policy(&self) -> EmissionPolicy {
        self.shared.state.lock().mode.policy()
    }

    /// The current detection strategy.
    pub fn strategy(&self) -> DetectionStrategy {
        self.shared.state.lock().mode.strategy()
    }

    /// The settings this watcher was built with.
    pub fn settings(&self) -> &WatchSettings {
        &self.shared.settings
    }

    /// Start polling every `interval`, replacing any running poll timer.
    ///
    /// The first pass runs one interval from now. Intervals below 1ms are
    /// raised to 1ms.
    ///
    /// # Arguments
    ///
    /// * `interval` - Time between poll passes, at most [`MAX_POLL_INTERVAL`]
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Interception is already active ([`WatchError::IllegalStrategyTransition`])
    /// - `interval` is longer than [`MAX_POLL_INTERVAL`] ([`WatchError::InvalidPollInterval`])
    /// - No tokio runtime is running ([`WatchError::NoRuntime`])
    ///
    /// On error no timer is started and the previous timer keeps running.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use attr_watch::prelude::*;
    /// use std::time::Duration;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> attr_watch::error::Result<()> {
    /// let watcher = AttrWatcher::new();
    /// watcher.start_polling(Duration::from_millis(250))?;
    /// assert_eq!(watcher.poll_interval(), Some(Duration::from_millis(250)));
    ///
    /// // Re-arming replaces the running timer.
    /// watcher.start_polling(Duration::from_secs(1))?;
    /// assert_eq!(watcher.poll_interval(), Some(Duration::from_secs(1)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn start_polling(&self, interval: Duration) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.mode.check_poll()?;
        if interval > MAX_POLL_INTERVAL {
            return Err(WatchError::InvalidPollInterval {
                interval,
                max: MAX_POLL_INTERVAL,
            });
        }
        let runtime = Handle::try_current().map_err(|_| WatchError::NoRuntime)?;
        state.mode.enter_poll()?;

        // Stops the old timer before the new one exists.
        state.poll = None;
        state.poll_generation += 1;
        let generation = state.poll_generation;
        state.registry.retag(Detection::Unwatched, Detection::Polled);
        state.poll = Some(PollTimer::spawn(
            &runtime,
            Arc::downgrade(&self.shared),
            generation,
            interval,
        ));

        tracing::debug!(generation, interval_ms = interval.as_millis() as u64, "polling started");
        Ok(())
    }

    /// Start polling at the interval from [`WatchSettings`].
    pub fn start_default_polling(&self) -> Result<()> {
        self.start_polling(self.shared.settings.poll_interval())
    }

    /// Stop the poll timer, if any. No pass starts after this returns.
    ///
    /// Polled entries go back to being unwatched until polling or
    /// interception starts again.
    pub fn stop_polling(&self) {
        let mut state = self.shared.state.lock();
        if state.poll.take().is_some() {
            state.mode.leave_poll();
            state.registry.retag(Detection::Polled, Detection::Unwatched);
            tracing::debug!("polling stopped");
        }
    }

    /// True while a poll timer is armed.
    pub fn is_polling(&self) -> bool {
        self.shared.state.lock().poll.is_some()
    }

    /// Period of the armed poll timer.
    pub fn poll_interval(&self) -> Option<Duration> {
        self.shared.state.lock().poll.as_ref().map(PollTimer::period)
    }

    /// Switch to interception. Returns how many entries were rewritten.
    ///
    /// Stops polling, then replaces the storage of every registered attribute
    /// not yet intercepted with an accessor that reports writes synchronously.
    /// The rewrite cannot be undone, and polling can never be started again
    /// on this watcher. A warning with code [`INTERCEPT_PERMANENT`] goes to
    /// the diagnostics sink on the first activation.
    pub fn start_intercepting(&self) -> usize {
        let (first, rewritten, retained) = {
            let mut state = self.shared.state.lock();
            self.shared.purge(&mut state);
            let first = state.mode.enter_intercept();
            state.poll = None;
            let watcher = Arc::downgrade(&self.shared);
            let rewritten = intercept::install(&mut state.registry, &watcher);
            (first, rewritten, state.registry.take_retained())
        };
        drop(retained);

        if first {
            self.shared.diagnostics.warn(&Diagnostic {
                code: INTERCEPT_PERMANENT,
                detail: format!(
                    "attribute access on {} watched attribute(s) has been permanently rewritten; \
                     native behavior cannot be restored on those object instances",
                    rewritten
                ),
            });
        }
        tracing::debug!(rewritten, "interception installed");
        rewritten
    }

    /// Subscribe to one event channel.
    ///
    /// Returns a handle that can be dropped to unsubscribe.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionHandle
    where
        F: Fn(&WatchEvent) + Send + Sync + 'static,
    {
        self.shared.bus.subscribe(kind, callback)
    }

    /// Subscribe to both event channels.
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&WatchEvent) + Send + Sync + 'static,
    {
        self.shared.bus.subscribe_all(callback)
    }

    /// The bus this watcher publishes to.
    pub fn events(&self) -> &EventBus {
        &self.shared.bus
    }
}

impl Default for AttrWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AttrWatcher {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}
