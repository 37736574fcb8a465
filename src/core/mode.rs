//! Detection strategy and emission policy selection.

use crate::error::{Result, WatchError};
use serde::Deserialize;
use std::fmt;

/// How changes are discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DetectionStrategy {
    /// No detection has been started.
    #[default]
    Idle,
    /// A timer re-reads every attribute.
    Poll,
    /// Attribute assignment is intercepted. Permanent once selected.
    Intercept,
}

impl fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Poll => "poll",
            Self::Intercept => "intercept",
        };
        f.write_str(name)
    }
}

/// What a notification payload contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionPolicy {
    /// Only entries whose value changed.
    #[default]
    #[serde(alias = "changedOnly")]
    ChangedOnly,
    /// Every registered entry on every detection pass.
    All,
}

impl fmt::Display for EmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ChangedOnly => "changed_only",
            Self::All => "all",
        };
        f.write_str(name)
    }
}

/// Detection capability attached to a single watched entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Detection {
    /// Registered but no detector covers it.
    #[default]
    Unwatched,
    /// Re-read on every poll tick.
    Polled,
    /// Its attribute storage has been replaced by an intercepting accessor.
    Intercepted,
}

/// Tracks the single active strategy and emission policy.
#[derive(Debug, Default)]
pub(crate) struct ModeSelector {
    strategy: DetectionStrategy,
    policy: EmissionPolicy,
    intercept_announced: bool,
}

impl ModeSelector {
    pub(crate) fn new(policy: EmissionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub(crate) fn strategy(&self) -> DetectionStrategy {
        self.strategy
    }

    pub(crate) fn policy(&self) -> EmissionPolicy {
        self.policy
    }

    pub(crate) fn set_policy(&mut self, policy: EmissionPolicy) {
        self.policy = policy;
    }

    /// Fails if polling may no longer be selected.
    pub(crate) fn check_poll(&self) -> Result<()> {
        if self.strategy == DetectionStrategy::Intercept {
            return Err(WatchError::IllegalStrategyTransition {
                from: self.strategy,
                to: DetectionStrategy::Poll,
            });
        }
        Ok(())
    }

    pub(crate) fn enter_poll(&mut self) -> Result<()> {
        self.check_poll()?;
        self.strategy = DetectionStrategy::Poll;
        Ok(())
    }

    /// Leave polling without selecting another strategy.
    pub(crate) fn leave_poll(&mut self) {
        if self.strategy == DetectionStrategy::Poll {
            self.strategy = DetectionStrategy::Idle;
        }
    }

    /// Select interception. Returns true on the first activation only.
    pub(crate) fn enter_intercept(&mut self) -> bool {
        self.strategy = DetectionStrategy::Intercept;
        !std::mem::replace(&mut self.intercept_announced, true)
    }

    /// Detection that a newly registered entry receives.
    pub(crate) fn detection_for_new_entry(&self) -> Detection {
        match self.strategy {
            DetectionStrategy::Poll => Detection::Polled,
            DetectionStrategy::Idle | DetectionStrategy::Intercept => Detection::Unwatched,
        }
    }
}
