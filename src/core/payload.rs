//! Notification payloads.

use crate::object::Value;
use indexmap::IndexMap;
use serde::Serialize;

/// Simple payload: display key to current value.
///
/// Keys are unique; inserting a key twice keeps the later value.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChangePayload(IndexMap<String, Value>);

/// Detailed payload: display key to a new/old pair.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FullPayload(IndexMap<String, ValueChange>);

/// A new value together with the value it replaced.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValueChange {
    /// Value after the change
    pub new: Value,
    /// Value before the change
    pub old: Value,
}

impl ValueChange {
    /// Pair a new value with the old one.
    pub fn new(new: Value, old: Value) -> Self {
        Self { new, old }
    }
}

macro_rules! payload_map {
    ($name:ident, $item:ty) => {
        impl $name {
            /// Create an empty payload.
            pub fn new() -> Self {
                Self::default()
            }

            /// Insert an item, overwriting any earlier item with the same key.
            pub fn insert(&mut self, key: impl Into<String>, item: $item) {
                self.0.insert(key.into(), item);
            }

            /// Look up an item by display key.
            pub fn get(&self, key: &str) -> Option<&$item> {
                self.0.get(key)
            }

            /// Number of keys in the payload.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// True if the payload carries no keys.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Display keys in insertion order.
            pub fn keys(&self) -> impl Iterator<Item = &str> {
                self.0.keys().map(String::as_str)
            }

            /// Iterate over key/item pairs in insertion order.
            pub fn iter(&self) -> impl Iterator<Item = (&str, &$item)> {
                self.0.iter().map(|(k, v)| (k.as_str(), v))
            }
        }

        impl<K: Into<String>> FromIterator<(K, $item)> for $name {
            fn from_iter<I: IntoIterator<Item = (K, $item)>>(iter: I) -> Self {
                let mut payload = Self::new();
                for (key, item) in iter {
                    payload.insert(key, item);
                }
                payload
            }
        }
    };
}

payload_map!(ChangePayload, Value);
payload_map!(FullPayload, ValueChange);
