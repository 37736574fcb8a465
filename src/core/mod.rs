//! Core watcher types.

mod builder;
mod mode;
mod payload;
pub(crate) mod registry;
mod settings;
pub(crate) mod watcher;

pub use builder::AttrWatcherBuilder;
pub use mode::{Detection, DetectionStrategy, EmissionPolicy};
pub use payload::{ChangePayload, FullPayload, ValueChange};
pub use registry::AttrSpec;
pub use settings::{MAX_POLL_INTERVAL, WatchSettings};
pub use watcher::AttrWatcher;
