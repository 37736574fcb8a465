//! Watcher settings and their loader.

use crate::core::EmissionPolicy;
use crate::error::{Result, WatchError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Longest poll interval a watcher accepts (365 days).
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Tunable defaults for a watcher.
///
/// Loadable from a YAML/TOML/JSON file and environment variables:
///
/// ```yaml
/// poll_interval_ms: 250
/// emission_policy: all
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Interval used by [`AttrWatcher::start_default_polling`](crate::core::AttrWatcher::start_default_polling)
    pub poll_interval_ms: u64,
    /// Emission policy the watcher starts with
    pub emission_policy: EmissionPolicy,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            emission_policy: EmissionPolicy::default(),
        }
    }
}

impl WatchSettings {
    /// The default poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check the settings for values the watcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(WatchError::InvalidSettings(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval() > MAX_POLL_INTERVAL {
            return Err(WatchError::InvalidSettings(format!(
                "poll_interval_ms must be at most {}",
                MAX_POLL_INTERVAL.as_millis()
            )));
        }
        Ok(())
    }

    /// Load settings from an optional file, then environment overrides.
    ///
    /// Later sources override earlier ones; keys missing everywhere keep
    /// their defaults. With prefix `ATTR_WATCH`, `ATTR_WATCH_POLL_INTERVAL_MS`
    /// overrides `poll_interval_ms`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or parsed
    /// - A value has the wrong type
    /// - Validation fails
    pub fn load(file: Option<&Path>, env_prefix: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        if let Some(prefix) = env_prefix {
            builder = builder.add_source(
                config::Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .try_parsing(true),
            );
        }

        let settings: Self = builder
            .build()
            .map_err(|e| WatchError::SettingsLoad(format!("Failed to build settings: {}", e)))?
            .try_deserialize()
            .map_err(|e| {
                WatchError::SettingsLoad(format!("Failed to deserialize settings: {}", e))
            })?;

        settings.validate()?;
        Ok(settings)
    }
}
