//! Assignment-interception change detection.

use crate::core::registry::Registry;
use crate::core::watcher::Shared;
use crate::core::{ChangePayload, Detection, EmissionPolicy, FullPayload, ValueChange};
use crate::error::Result;
use crate::notify::WatchEvent;
use crate::object::{Accessor, ObjectId, Value};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Accessor installed over a watched attribute.
///
/// Owns the attribute's value from installation on. While the watcher is
/// alive, each write is compared, stored and detected as one step under the
/// watcher's lock, so concurrent writers cannot leave the cache behind the
/// object.
pub(crate) struct InterceptAccessor {
    object: ObjectId,
    attribute: String,
    captured: Mutex<Value>,
    watcher: Weak<Shared>,
}

impl InterceptAccessor {
    pub(crate) fn object(&self) -> ObjectId {
        self.object
    }

    pub(crate) fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Replace the captured value. Returns false if `value` equals it.
    pub(crate) fn store(&self, value: &Value) -> bool {
        let mut captured = self.captured.lock();
        if *captured == *value {
            return false;
        }
        *captured = value.clone();
        true
    }
}

impl Accessor for InterceptAccessor {
    fn get(&self) -> Value {
        self.captured.lock().clone()
    }

    fn set(&self, value: Value) {
        match self.watcher.upgrade() {
            Some(shared) => shared.handle_intercepted_write(self, value),
            None => {
                self.store(&value);
            }
        }
    }
}

/// Rewrite every entry not yet intercepted. Returns how many entries were rewritten.
///
/// Entries sharing an object and attribute share one accessor. Entries whose
/// object is gone are left as they are.
pub(crate) fn install(registry: &mut Registry, watcher: &Weak<Shared>) -> usize {
    let mut installed: Vec<(ObjectId, String)> = registry
        .entries()
        .iter()
        .filter(|e| e.detection == Detection::Intercepted)
        .map(|e| (e.object_id, e.attribute.clone()))
        .collect();

    let mut rewritten = 0;
    let (entries, retained) = registry.entries_and_retained();
    for entry in entries
        .iter_mut()
        .filter(|e| e.detection != Detection::Intercepted)
    {
        let Some(object) = entry.object.upgrade() else {
            continue;
        };
        let slot = (entry.object_id, entry.attribute.clone());
        if !installed.contains(&slot) {
            let current = object.get(&entry.attribute).unwrap_or_default();
            object.define_accessor(
                &entry.attribute,
                Arc::new(InterceptAccessor {
                    object: entry.object_id,
                    attribute: entry.attribute.clone(),
                    captured: Mutex::new(current),
                    watcher: Weak::clone(watcher),
                }),
            );
            installed.push(slot);
        }
        entry.detection = Detection::Intercepted;
        rewritten += 1;
        retained.push(object);
    }
    rewritten
}

/// Build the events for a write of `new` to `object.attribute`, then cache it.
///
/// Under [`EmissionPolicy::All`] both payloads snapshot the whole registry.
/// Under [`EmissionPolicy::ChangedOnly`] they carry only the written entries,
/// and the detailed payload skips entries whose cache already held `new`.
pub(crate) fn detect(
    registry: &mut Registry,
    policy: EmissionPolicy,
    object: ObjectId,
    attribute: &str,
    new: &Value,
) -> Result<Vec<WatchEvent>> {
    let targets: Vec<usize> = registry
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            e.detection == Detection::Intercepted && e.object_id == object && e.attribute == attribute
        })
        .map(|(index, _)| index)
        .collect();
    if targets.is_empty() {
        return Ok(Vec::new());
    }

    let (simple, full) = match policy {
        EmissionPolicy::All => (
            registry.snapshot_values(policy)?,
            registry.snapshot_changes(policy)?,
        ),
        EmissionPolicy::ChangedOnly => {
            let entries = registry.entries();
            let mut simple = ChangePayload::new();
            let mut full = FullPayload::new();
            for &index in &targets {
                let entry = &entries[index];
                simple.insert(entry.display_key.clone(), new.clone());
                if *new != entry.last_value {
                    full.insert(
                        entry.display_key.clone(),
                        ValueChange::new(new.clone(), entry.last_value.clone()),
                    );
                }
            }
            (simple, full)
        }
    };

    let entries = registry.entries_mut();
    for index in targets {
        entries[index].last_value = new.clone();
    }

    let mut events = Vec::with_capacity(2);
    if !simple.is_empty() {
        events.push(WatchEvent::Change(simple));
    }
    if !full.is_empty() {
        events.push(WatchEvent::ChangeFull(full));
    }
    Ok(events)
}
