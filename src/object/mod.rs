//! The object model watchers operate on.
//!
//! Objects are attribute bags that know nothing about watching. They expose
//! two generic runtime facilities the detectors build on: accessor
//! redefinition ([`Object::define_accessor`]) and reclaim hooks
//! ([`Object::on_reclaim`]).

mod instance;
mod value;

pub use instance::{Accessor, Object, ObjectId};
pub use value::{SharedRef, Value};
