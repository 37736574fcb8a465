//! Dynamic objects with redefinable attribute storage.

use crate::object::Value;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`Object`]. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Replacement read/write behavior for a single attribute.
///
/// Installed with [`Object::define_accessor`]. Once installed, the accessor
/// fully owns the attribute: reads and writes never touch the object's own
/// storage again.
pub trait Accessor: Send + Sync {
    /// Produce the attribute's current value.
    fn get(&self) -> Value;

    /// Handle an assignment to the attribute.
    fn set(&self, value: Value);
}

enum Slot {
    Data(Value),
    Accessor(Arc<dyn Accessor>),
}

type ReclaimHook = Box<dyn FnOnce(ObjectId) + Send>;

/// A live object with named attributes.
///
/// Objects are always shared as `Arc<Object>`. Watchers hold only
/// `Weak<Object>` handles, so the object is dropped as soon as its last
/// owner lets go; hooks registered with [`Object::on_reclaim`] then run
/// with the object's id.
///
/// # Examples
///
/// ```rust
/// use attr_watch::object::{Object, Value};
///
/// let obj = Object::with_attributes([("port", Value::from(8080))]);
/// assert_eq!(obj.get("port"), Some(Value::from(8080)));
///
/// obj.set("port", 9090);
/// assert_eq!(obj.get("port"), Some(Value::from(9090)));
/// assert!(obj.get("host").is_none());
/// ```
pub struct Object {
    id: ObjectId,
    slots: RwLock<IndexMap<String, Slot>>,
    reclaim_hooks: Mutex<Vec<ReclaimHook>>,
}

impl Object {
    /// Create an object with no attributes.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::empty())
    }

    /// Create an object with an initial set of attributes.
    pub fn with_attributes<I, K, V>(attributes: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let object = Self::empty();
        {
            let mut slots = object.slots.write();
            for (name, value) in attributes {
                slots.insert(name.into(), Slot::Data(value.into()));
            }
        }
        Arc::new(object)
    }

    fn empty() -> Self {
        Self {
            id: ObjectId::next(),
            slots: RwLock::new(IndexMap::new()),
            reclaim_hooks: Mutex::new(Vec::new()),
        }
    }

    /// This object's identity.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// True if the attribute exists.
    pub fn has(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Names of all attributes in definition order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    /// Read an attribute. Returns `None` if it does not exist.
    pub fn get(&self, name: &str) -> Option<Value> {
        let accessor = {
            let slots = self.slots.read();
            match slots.get(name)? {
                Slot::Data(value) => return Some(value.clone()),
                Slot::Accessor(accessor) => Arc::clone(accessor),
            }
        };
        Some(accessor.get())
    }

    /// Assign an attribute, creating it if absent.
    ///
    /// If an accessor owns the attribute, the object's lock is released
    /// before the accessor runs.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let accessor = {
            let mut slots = self.slots.write();
            if !slots.contains_key(name) {
                slots.insert(name.to_string(), Slot::Data(value));
                return;
            }
            match slots.get_mut(name) {
                Some(Slot::Accessor(accessor)) => Arc::clone(accessor),
                Some(Slot::Data(current)) => {
                    *current = value;
                    return;
                }
                None => return,
            }
        };
        accessor.set(value);
    }

    /// Replace an attribute's storage with an accessor pair.
    ///
    /// There is no operation to restore plain storage.
    pub fn define_accessor(&self, name: &str, accessor: Arc<dyn Accessor>) {
        self.slots
            .write()
            .insert(name.to_string(), Slot::Accessor(accessor));
    }

    /// True if the attribute is owned by an accessor.
    pub fn has_accessor(&self, name: &str) -> bool {
        matches!(self.slots.read().get(name), Some(Slot::Accessor(_)))
    }

    /// Run `hook` with this object's id when the object is dropped.
    pub fn on_reclaim<F>(&self, hook: F)
    where
        F: FnOnce(ObjectId) + Send + 'static,
    {
        self.reclaim_hooks.lock().push(Box::new(hook));
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        let hooks = std::mem::take(self.reclaim_hooks.get_mut());
        for hook in hooks {
            hook(self.id);
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("attributes", &self.attribute_names())
            .finish()
    }
}
