//! Diagnostic warnings emitted alongside detection.

use std::fmt;

/// Code of the warning emitted when interception is first activated.
pub const INTERCEPT_PERMANENT: &str = "attr_watch::intercept::permanent";

/// A machine-readable code with human-readable detail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Stable identifier for the condition
    pub code: &'static str,
    /// Description for humans
    pub detail: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.detail)
    }
}

/// Receiver for diagnostic warnings.
pub trait DiagnosticSink: Send + Sync {
    /// Report a warning.
    fn warn(&self, diagnostic: &Diagnostic);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for std::sync::Arc<T> {
    fn warn(&self, diagnostic: &Diagnostic) {
        (**self).warn(diagnostic);
    }
}

/// Default sink that logs through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn warn(&self, diagnostic: &Diagnostic) {
        tracing::warn!(code = diagnostic.code, "{}", diagnostic.detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let d = Diagnostic {
            code: INTERCEPT_PERMANENT,
            detail: "rewritten".to_string(),
        };
        assert_eq!(d.to_string(), "[attr_watch::intercept::permanent] rewritten");
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        TracingDiagnostics.warn(&Diagnostic {
            code: INTERCEPT_PERMANENT,
            detail: "no subscriber installed".to_string(),
        });
    }
}
