//! The two detection strategies.
//!
//! Both run under the watcher's state lock and only read or update cached
//! values; neither adds or removes entries.

pub(crate) mod intercept;
pub(crate) mod poll;
