//! Builder for constructing AttrWatcher instances.

use crate::core::watcher::WatcherParts;
use crate::core::{AttrWatcher, EmissionPolicy, WatchSettings};
use crate::error::Result;
use crate::notify::DiagnosticSink;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::metrics::WatchMetrics;

/// Builder for constructing an `AttrWatcher`.
///
/// Settings are resolved in order: explicit [`with_settings`](Self::with_settings)
/// or the settings file plus environment overrides, then individual
/// overrides such as [`with_emission_policy`](Self::with_emission_policy).
///
/// # Examples
///
/// ```rust,no_run
/// use attr_watch::prelude::*;
/// use std::time::Duration;
///
/// # fn example() -> Result<()> {
/// let watcher = AttrWatcher::builder()
///     .with_settings_file("config/watch.yaml")
///     .with_env_overrides("ATTR_WATCH")
///     .with_poll_interval(Duration::from_millis(50))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct AttrWatcherBuilder {
    settings: Option<WatchSettings>,
    settings_file: Option<PathBuf>,
    env_prefix: Option<String>,
    emission_policy: Option<EmissionPolicy>,
    poll_interval: Option<Duration>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    #[cfg(feature = "metrics")]
    metrics: Option<WatchMetrics>,
}

impl AttrWatcherBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            settings: None,
            settings_file: None,
            env_prefix: None,
            emission_policy: None,
            poll_interval: None,
            diagnostics: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Use these settings instead of loading them.
    pub fn with_settings(mut self, settings: WatchSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Load settings from a file. Format is chosen by extension.
    pub fn with_settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_file = Some(path.into());
        self
    }

    /// Override settings from environment variables with `prefix`.
    ///
    /// ```rust,no_run
    /// use attr_watch::prelude::*;
    ///
    /// // ATTR_WATCH_POLL_INTERVAL_MS=250 -> poll_interval_ms = 250
    /// AttrWatcher::builder().with_env_overrides("ATTR_WATCH");
    /// ```
    pub fn with_env_overrides(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Emission policy the watcher starts with.
    pub fn with_emission_policy(mut self, policy: EmissionPolicy) -> Self {
        self.emission_policy = Some(policy);
        self
    }

    /// Interval used by `start_default_polling`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Send diagnostic warnings to `sink` instead of `tracing`.
    pub fn with_diagnostics<D: DiagnosticSink + 'static>(mut self, sink: D) -> Self {
        self.diagnostics = Some(Arc::new(sink));
        self
    }

    /// Record OpenTelemetry metrics with `meter`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(WatchMetrics::new(meter));
        self
    }

    /// Build the watcher.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The settings file cannot be loaded or deserialized
    /// - The resolved settings fail validation
    pub fn build(self) -> Result<AttrWatcher> {
        let mut settings = match self.settings {
            Some(settings) => settings,
            None if self.settings_file.is_some() || self.env_prefix.is_some() => {
                WatchSettings::load(self.settings_file.as_deref(), self.env_prefix.as_deref())?
            }
            None => WatchSettings::default(),
        };

        if let Some(policy) = self.emission_policy {
            settings.emission_policy = policy;
        }
        if let Some(interval) = self.poll_interval {
            settings.poll_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        }
        settings.validate()?;

        let mut parts = WatcherParts {
            settings,
            ..WatcherParts::default()
        };
        if let Some(diagnostics) = self.diagnostics {
            parts.diagnostics = diagnostics;
        }
        #[cfg(feature = "metrics")]
        {
            parts.metrics = self.metrics;
        }

        Ok(AttrWatcher::from_parts(parts))
    }
}

impl Default for AttrWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AttrWatcher {
    /// Create a new builder for constructing a watcher.
    pub fn builder() -> AttrWatcherBuilder {
        AttrWatcherBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatchError;
    use crate::notify::Diagnostic;
    use std::fs;
    use tempfile::TempDir;

    struct Silent;

    impl DiagnosticSink for Silent {
        fn warn(&self, _diagnostic: &Diagnostic) {}
    }

    #[test]
    fn test_defaults() {
        let watcher = AttrWatcher::builder().build().unwrap();
        assert_eq!(watcher.settings(), &WatchSettings::default());
        assert_eq!(watcher.emission_policy(), EmissionPolicy::ChangedOnly);
    }

    #[test]
    fn test_overrides_apply_after_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("watch.yaml");
        fs::write(&path, "poll_interval_ms: 500\nemission_policy: all\n").unwrap();

        let watcher = AttrWatcher::builder()
            .with_settings_file(&path)
            .with_emission_policy(EmissionPolicy::ChangedOnly)
            .build()
            .unwrap();

        assert_eq!(watcher.settings().poll_interval_ms, 500);
        assert_eq!(watcher.emission_policy(), EmissionPolicy::ChangedOnly);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = AttrWatcher::builder()
            .with_poll_interval(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(WatchError::InvalidSettings(_))));
    }

    #[test]
    fn test_oversized_interval_rejected() {
        let result = AttrWatcher::builder()
            .with_poll_interval(Duration::MAX)
            .build();
        assert!(matches!(result, Err(WatchError::InvalidSettings(_))));
    }

    #[test]
    fn test_custom_diagnostics() {
        let watcher = AttrWatcher::builder().with_diagnostics(Silent).build().unwrap();
        assert_eq!(watcher.start_intercepting(), 0);
    }

    #[test]
    fn test_builder_accumulates() {
        let builder = AttrWatcherBuilder::new()
            .with_env_overrides("ATTR_WATCH")
            .with_poll_interval(Duration::from_millis(20));

        assert_eq!(builder.env_prefix, Some("ATTR_WATCH".to_string()));
        assert_eq!(builder.poll_interval, Some(Duration::from_millis(20)));
    }
}
