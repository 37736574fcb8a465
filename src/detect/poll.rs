//! Timer-driven change detection.

use crate::core::watcher::Shared;
use crate::core::registry::Registry;
use crate::core::{ChangePayload, Detection, EmissionPolicy, MAX_POLL_INTERVAL};
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Shortest period the timer accepts.
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A running poll timer. Dropping it stops the timer.
pub(crate) struct PollTimer {
    generation: u64,
    period: Duration,
    task: JoinHandle<()>,
}

impl PollTimer {
    /// Spawn a task that runs a poll pass every `period`.
    ///
    /// `period` is clamped to the accepted range, so the first deadline
    /// cannot overflow. The first pass happens one full period after
    /// spawning. Each pass checks `generation` against the watcher's
    /// current timer, so a replaced timer never runs another pass even if
    /// its task has not been torn down yet.
    pub(crate) fn spawn(
        runtime: &Handle,
        shared: Weak<Shared>,
        generation: u64,
        period: Duration,
    ) -> Self {
        let period = period.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        let task = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if !shared.run_poll_pass(generation) {
                    break;
                }
            }
            tracing::trace!(generation, "poll timer exited");
        });

        Self {
            generation,
            period,
            task,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Re-read every polled entry and build the `change` payload.
///
/// The cache is updated only for entries whose value actually changed,
/// under either policy. Entries whose object is gone are skipped.
pub(crate) fn detect(registry: &mut Registry, policy: EmissionPolicy) -> ChangePayload {
    let mut payload = ChangePayload::new();
    let (entries, retained) = registry.entries_and_retained();
    for entry in entries
        .iter_mut()
        .filter(|e| e.detection == Detection::Polled)
    {
        let Some(current) = entry.read(retained) else {
            continue;
        };
        let changed = current != entry.last_value;
        if changed {
            entry.last_value = current.clone();
        }
        if changed || policy == EmissionPolicy::All {
            payload.insert(entry.display_key.clone(), current);
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttrSpec;
    use crate::object::{Object, Value};

    fn polled(objects: &[(&std::sync::Arc<Object>, &str, &str)]) -> Registry {
        let mut registry = Registry::new();
        for (obj, attr, key) in objects {
            registry
                .register_batch(obj, &[AttrSpec::from((*attr, *key))], Detection::Polled)
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_unchanged_value_yields_empty_payload() {
        let obj = Object::with_attributes([("value", 1)]);
        let mut registry = polled(&[(&obj, "value", "v")]);

        obj.set("value", 1);
        assert!(detect(&mut registry, EmissionPolicy::ChangedOnly).is_empty());

        obj.set("value", 2);
        let payload = detect(&mut registry, EmissionPolicy::ChangedOnly);
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.get("v"), Some(&Value::Int(2)));

        assert!(detect(&mut registry, EmissionPolicy::ChangedOnly).is_empty());
    }

    #[test]
    fn test_all_policy_includes_unchanged() {
        let obj = Object::with_attributes([("a", 1), ("b", 2)]);
        let mut registry = polled(&[(&obj, "a", "a"), (&obj, "b", "b")]);

        obj.set("a", 3);
        let payload = detect(&mut registry, EmissionPolicy::All);
        assert_eq!(payload.get("a"), Some(&Value::Int(3)));
        assert_eq!(payload.get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_all_policy_only_updates_changed_cache() {
        let obj = Object::with_attributes([("a", 1)]);
        let mut registry = polled(&[(&obj, "a", "a")]);

        detect(&mut registry, EmissionPolicy::All);
        obj.set("a", 5);
        detect(&mut registry, EmissionPolicy::All);
        assert_eq!(registry.cached_value(&obj, "a"), Some(Value::Int(5)));

        // Switching back to changed-only sees no stale difference.
        assert!(detect(&mut registry, EmissionPolicy::ChangedOnly).is_empty());
    }

    #[test]
    fn test_unwatched_entries_ignored() {
        let obj = Object::with_attributes([("a", 1)]);
        let mut registry = Registry::new();
        registry
            .register_batch(&obj, &[AttrSpec::from("a")], Detection::Unwatched)
            .unwrap();

        obj.set("a", 2);
        assert!(detect(&mut registry, EmissionPolicy::All).is_empty());
    }

    #[test]
    fn test_dead_objects_skipped() {
        let alive = Object::with_attributes([("a", 1)]);
        let dead = Object::with_attributes([("a", 1)]);
        let mut registry = polled(&[(&alive, "a", "alive"), (&dead, "a", "dead")]);
        drop(dead);

        let payload = detect(&mut registry, EmissionPolicy::All);
        assert_eq!(payload.keys().collect::<Vec<_>>(), vec!["alive"]);
        // Removal is the registry's job, not the detector's.
        assert_eq!(registry.len(), 2);
    }
}
