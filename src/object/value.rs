//! Attribute values and their strict equality.

use serde::{Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A value stored in an object attribute.
///
/// Equality is strict: primitives compare by value, [`Value::Ref`] compares by
/// pointer identity. There is no structural comparison of shared data.
///
/// # Examples
///
/// ```rust
/// use attr_watch::object::{SharedRef, Value};
///
/// assert_eq!(Value::from(1), Value::from(1.0));
/// assert_ne!(Value::from("a"), Value::from("b"));
///
/// let shared = SharedRef::new(vec![1, 2, 3]);
/// assert_eq!(Value::Ref(shared.clone()), Value::Ref(shared));
/// assert_ne!(
///     Value::Ref(SharedRef::new(vec![1])),
///     Value::Ref(SharedRef::new(vec![1])),
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// An immutable string.
    Str(Arc<str>),
    /// Shared data compared by identity.
    Ref(SharedRef),
}

impl Value {
    /// Returns the string contents if this is a [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is a [`Value::Int`].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => int_eq_float(*a, *b),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a.same(b),
            _ => false,
        }
    }
}

/// Exact comparison: true only if `x` is a whole number equal to `n`.
fn int_eq_float(n: i64, x: f64) -> bool {
    // i64::MIN is exactly representable; -i64::MIN (2^63) is one past i64::MAX.
    const LOWER: f64 = i64::MIN as f64;
    x.fract() == 0.0 && (LOWER..-LOWER).contains(&x) && x as i64 == n
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Ref(r) => write!(f, "<ref {}>", r.type_name()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Ref(r) => serializer.serialize_str(&format!("<ref {}>", r.type_name())),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<SharedRef> for Value {
    fn from(r: SharedRef) -> Self {
        Self::Ref(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Type-erased shared data, compared by identity.
#[derive(Clone)]
pub struct SharedRef {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl SharedRef {
    /// Wrap a value in a new shared allocation.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the shared data as `T`, if it has that type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// The Rust type name of the wrapped data.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True if both handles point at the same allocation.
    pub fn same(&self, other: &SharedRef) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

impl fmt::Debug for SharedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRef")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
