//! The set of watched attribute entries.

use crate::core::{ChangePayload, Detection, EmissionPolicy, FullPayload, ValueChange};
use crate::error::{Result, WatchError};
use crate::object::{Object, ObjectId, Value};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

pub(crate) type EntryId = u64;

/// One attribute to register, with an optional display key.
///
/// Converts from an attribute name or an `(attribute, display_key)` pair.
///
/// # Examples
///
/// ```rust
/// use attr_watch::core::AttrSpec;
///
/// let plain = AttrSpec::from("status");
/// assert_eq!(plain.display_key(), "status");
///
/// let remapped = AttrSpec::from(("status", "statusA"));
/// assert_eq!(remapped.display_key(), "statusA");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttrSpec {
    attribute: String,
    display_key: Option<String>,
}

impl AttrSpec {
    /// Watch `attribute` under its own name.
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            display_key: None,
        }
    }

    /// Use `key` in payloads instead of the attribute name.
    pub fn with_display_key(mut self, key: impl Into<String>) -> Self {
        self.display_key = Some(key.into());
        self
    }

    /// The attribute read from the object.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// The key used in payloads.
    pub fn display_key(&self) -> &str {
        self.display_key.as_deref().unwrap_or(&self.attribute)
    }
}

impl From<&str> for AttrSpec {
    fn from(attribute: &str) -> Self {
        Self::new(attribute)
    }
}

impl From<String> for AttrSpec {
    fn from(attribute: String) -> Self {
        Self::new(attribute)
    }
}

impl From<(&str, &str)> for AttrSpec {
    fn from((attribute, key): (&str, &str)) -> Self {
        Self::new(attribute).with_display_key(key)
    }
}

impl From<(String, String)> for AttrSpec {
    fn from((attribute, key): (String, String)) -> Self {
        Self::new(attribute).with_display_key(key)
    }
}

impl From<(&str, Option<&str>)> for AttrSpec {
    fn from((attribute, key): (&str, Option<&str>)) -> Self {
        Self {
            attribute: attribute.to_string(),
            display_key: key.map(str::to_string),
        }
    }
}

/// One registration of an attribute on one object.
pub(crate) struct WatchedEntry {
    pub(crate) id: EntryId,
    pub(crate) object: Weak<Object>,
    pub(crate) object_id: ObjectId,
    pub(crate) attribute: String,
    pub(crate) display_key: String,
    pub(crate) last_value: Value,
    pub(crate) detection: Detection,
}

impl WatchedEntry {
    /// Read the attribute's current value. `None` if the object is gone.
    ///
    /// The upgraded object is pushed onto `retained`, so it is never
    /// dropped while the caller still holds the engine lock.
    pub(crate) fn read(&self, retained: &mut Vec<Arc<Object>>) -> Option<Value> {
        let object = self.object.upgrade()?;
        let value = object.get(&self.attribute).unwrap_or_default();
        retained.push(object);
        Some(value)
    }

    pub(crate) fn points_at(&self, object: &Arc<Object>) -> bool {
        std::ptr::eq(self.object.as_ptr(), Arc::as_ptr(object))
    }
}

/// Registry of watched entries.
///
/// Holds only weak references. Each watched object gets one reclaim hook
/// per registry; the hook enqueues the object's id and the registry drops
/// the matching entries the next time [`Registry::purge_reclaimed`] runs.
///
/// Objects upgraded during a pass pile up in `retained` until the caller
/// takes them with [`Registry::take_retained`] and drops them unlocked. A
/// final drop runs reclaim hooks, and those may call back into the watcher.
pub(crate) struct Registry {
    entries: Vec<WatchedEntry>,
    retained: Vec<Arc<Object>>,
    next_id: EntryId,
    hooked: HashSet<ObjectId>,
    reclaim_tx: mpsc::UnboundedSender<ObjectId>,
    reclaim_rx: mpsc::UnboundedReceiver<ObjectId>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        let (reclaim_tx, reclaim_rx) = mpsc::unbounded_channel();
        Self {
            entries: Vec::new(),
            retained: Vec::new(),
            next_id: 0,
            hooked: HashSet::new(),
            reclaim_tx,
            reclaim_rx,
        }
    }

    /// Register every spec against `object`.
    ///
    /// All specs are validated before any entry is added, so a failure
    /// leaves the registry unchanged. The error names the first invalid spec.
    pub(crate) fn register_batch(
        &mut self,
        object: &Arc<Object>,
        specs: &[AttrSpec],
        detection: Detection,
    ) -> Result<usize> {
        if specs.is_empty() {
            return Err(WatchError::InvalidRegistrationArguments(
                "expected at least one attribute".to_string(),
            ));
        }

        let mut initial = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.attribute.is_empty() {
                return Err(WatchError::InvalidRegistrationArguments(
                    "attribute name must not be empty".to_string(),
                ));
            }
            if spec.display_key.as_deref() == Some("") {
                return Err(WatchError::InvalidRegistrationArguments(format!(
                    "display key for '{}' must not be empty",
                    spec.attribute
                )));
            }
            let value = object
                .get(&spec.attribute)
                .ok_or_else(|| WatchError::AttributeNotFound {
                    attribute: spec.attribute.clone(),
                    object: object.id(),
                })?;
            initial.push(value);
        }

        self.hook(object);
        for (spec, last_value) in specs.iter().zip(initial) {
            let id = self.next_id;
            self.next_id += 1;
            self.entries.push(WatchedEntry {
                id,
                object: Arc::downgrade(object),
                object_id: object.id(),
                attribute: spec.attribute.clone(),
                display_key: spec.display_key().to_string(),
                last_value,
                detection,
            });
        }

        tracing::debug!(object = %object.id(), count = specs.len(), "registered attributes");
        Ok(specs.len())
    }

    fn hook(&mut self, object: &Arc<Object>) {
        if self.hooked.insert(object.id()) {
            let tx = self.reclaim_tx.clone();
            object.on_reclaim(move |id| {
                // The receiver is gone once the watcher itself has been dropped.
                let _ = tx.send(id);
            });
        }
    }

    /// Remove every entry that points at `object`. Returns how many were removed.
    pub(crate) fn unregister_object(&mut self, object: &Arc<Object>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.points_at(object));
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(object = %object.id(), removed, "unregistered object");
        }
        removed
    }

    /// Drop entries whose objects have been reclaimed. Returns how many were removed.
    pub(crate) fn purge_reclaimed(&mut self) -> usize {
        let mut removed = 0;
        while let Ok(id) = self.reclaim_rx.try_recv() {
            self.hooked.remove(&id);
            let before = self.entries.len();
            self.entries.retain(|entry| entry.object_id != id);
            removed += before - self.entries.len();
        }
        if removed > 0 {
            tracing::debug!(removed, "purged reclaimed entries");
        }
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &[WatchedEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [WatchedEntry] {
        &mut self.entries
    }

    /// Entries together with the buffer upgraded objects are kept in.
    pub(crate) fn entries_and_retained(
        &mut self,
    ) -> (&mut [WatchedEntry], &mut Vec<Arc<Object>>) {
        (&mut self.entries, &mut self.retained)
    }

    /// Objects kept alive by the last pass. Drop them after unlocking.
    pub(crate) fn take_retained(&mut self) -> Vec<Arc<Object>> {
        std::mem::take(&mut self.retained)
    }

    /// Move every entry with detection `from` to `to`.
    pub(crate) fn retag(&mut self, from: Detection, to: Detection) {
        for entry in self.entries.iter_mut().filter(|e| e.detection == from) {
            entry.detection = to;
        }
    }

    pub(crate) fn contains_object(&self, object: &Arc<Object>) -> bool {
        self.entries.iter().any(|entry| entry.points_at(object))
    }

    pub(crate) fn cached_value(&self, object: &Arc<Object>, attribute: &str) -> Option<Value> {
        self.entries
            .iter()
            .find(|entry| entry.points_at(object) && entry.attribute == attribute)
            .map(|entry| entry.last_value.clone())
    }

    /// Current value of every live entry, keyed by display key.
    ///
    /// Only valid under [`EmissionPolicy::All`].
    pub(crate) fn snapshot_values(&mut self, policy: EmissionPolicy) -> Result<ChangePayload> {
        require_all("snapshot_values", policy)?;
        let Self {
            entries, retained, ..
        } = self;
        Ok(entries
            .iter()
            .filter_map(|entry| {
                entry
                    .read(retained)
                    .map(|value| (entry.display_key.clone(), value))
            })
            .collect())
    }

    /// Current value paired with the cached value for every live entry.
    ///
    /// Only valid under [`EmissionPolicy::All`].
    pub(crate) fn snapshot_changes(&mut self, policy: EmissionPolicy) -> Result<FullPayload> {
        require_all("snapshot_changes", policy)?;
        let Self {
            entries, retained, ..
        } = self;
        Ok(entries
            .iter()
            .filter_map(|entry| {
                let current = entry.read(retained)?;
                Some((
                    entry.display_key.clone(),
                    ValueChange::new(current, entry.last_value.clone()),
                ))
            })
            .collect())
    }
}

fn require_all(operation: &'static str, policy: EmissionPolicy) -> Result<()> {
    match policy {
        EmissionPolicy::All => Ok(()),
        EmissionPolicy::ChangedOnly => Err(WatchError::InvalidModeOperation { operation, policy }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(items: &[&str]) -> Vec<AttrSpec> {
        items.iter().map(|s| AttrSpec::from(*s)).collect()
    }

    #[test]
    fn test_register_caches_current_value() {
        let mut registry = Registry::new();
        let obj = Object::with_attributes([("value", 1)]);
        registry
            .register_batch(&obj, &specs(&["value"]), Detection::Unwatched)
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.cached_value(&obj, "value"), obj.get("value"));
    }

    #[test]
    fn test_missing_attribute_rejected() {
        let mut registry = Registry::new();
        let obj = Object::with_attributes([("value", 1)]);
        let err = registry
            .register_batch(&obj, &specs(&["nope"]), Detection::Unwatched)
            .unwrap_err();
        assert!(matches!(err, WatchError::AttributeNotFound { ref attribute, .. } if attribute == "nope"));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut registry = Registry::new();
        let obj = Object::with_attributes([("a", 1), ("b", 2)]);
        let result = registry.register_batch(&obj, &specs(&["a", "missing", "b"]), Detection::Unwatched);
        assert!(result.is_err());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_empty_batch_rejected() {
        let mut registry = Registry::new();
        let obj = Object::with_attributes([("a", 1)]);
        let err = registry
            .register_batch(&obj, &[], Detection::Unwatched)
            .unwrap_err();
        assert!(matches!(err, WatchError::InvalidRegistrationArguments(_)));
    }

    #[test]
    fn test_empty_display_key_rejected() {
        let mut registry = Registry::new();
        let obj = Object::with_attributes([("a", 1)]);
        let err = registry
            .register_batch(&obj, &[AttrSpec::from(("a", ""))], Detection::Unwatched)
            .unwrap_err();
        assert!(matches!(err, WatchError::InvalidRegistrationArguments(_)));
    }

    #[test]
    fn test_unregister_by_identity() {
        let mut registry = Registry::new();
        let a = Object::with_attributes([("x", 1), ("y", 2)]);
        let b = Object::with_attributes([("x", 1)]);
        registry
            .register_batch(&a, &specs(&["x", "y"]), Detection::Unwatched)
            .unwrap();
        registry
            .register_batch(&b, &specs(&["x"]), Detection::Unwatched)
            .unwrap();

        assert_eq!(registry.unregister_object(&a), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains_object(&b));
        assert_eq!(registry.unregister_object(&a), 0);
    }

    #[test]
    fn test_reclaimed_objects_purged() {
        let mut registry = Registry::new();
        let keep = Object::with_attributes([("x", 1)]);
        let gone = Object::with_attributes([("x", 1)]);
        registry
            .register_batch(&keep, &specs(&["x"]), Detection::Unwatched)
            .unwrap();
        registry
            .register_batch(&gone, &specs(&["x"]), Detection::Unwatched)
            .unwrap();

        drop(gone);
        assert_eq!(registry.purge_reclaimed(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains_object(&keep));
    }

    #[test]
    fn test_one_hook_per_object() {
        let mut registry = Registry::new();
        let obj = Object::with_attributes([("x", 1), ("y", 2)]);
        registry
            .register_batch(&obj, &specs(&["x"]), Detection::Unwatched)
            .unwrap();
        registry
            .register_batch(&obj, &specs(&["y"]), Detection::Unwatched)
            .unwrap();
        assert_eq!(registry.hooked.len(), 1);

        drop(obj);
        assert_eq!(registry.purge_reclaimed(), 2);
        assert!(registry.hooked.is_empty());
    }

    #[test]
    fn test_snapshot_requires_all_policy() {
        let mut registry = Registry::new();
        let obj = Object::with_attributes([("x", 1)]);
        registry
            .register_batch(&obj, &specs(&["x"]), Detection::Unwatched)
            .unwrap();

        assert!(matches!(
            registry.snapshot_values(EmissionPolicy::ChangedOnly),
            Err(WatchError::InvalidModeOperation { .. })
        ));
        assert!(matches!(
            registry.snapshot_changes(EmissionPolicy::ChangedOnly),
            Err(WatchError::InvalidModeOperation { .. })
        ));
        let values = registry.snapshot_values(EmissionPolicy::All).unwrap();
        assert_eq!(values.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_snapshot_skips_dead_entries() {
        let mut registry = Registry::new();
        let obj = Object::with_attributes([("x", 1)]);
        registry
            .register_batch(&obj, &specs(&["x"]), Detection::Unwatched)
            .unwrap();
        drop(obj);

        let values = registry.snapshot_values(EmissionPolicy::All).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_snapshot_retains_objects_until_taken() {
        let mut registry = Registry::new();
        let obj = Object::with_attributes([("x", 1)]);
        let weak = Arc::downgrade(&obj);
        registry
            .register_batch(&obj, &specs(&["x"]), Detection::Unwatched)
            .unwrap();

        registry.snapshot_values(EmissionPolicy::All).unwrap();
        drop(obj);
        assert!(weak.upgrade().is_some());

        drop(registry.take_retained());
        assert!(weak.upgrade().is_none());
    }
}
