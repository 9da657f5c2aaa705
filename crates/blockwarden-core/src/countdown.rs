//! Pausable countdown primitive.
//!
//! Both user-facing timers in the system (the focus timer and the
//! reroll-reset timer) are countdowns that must survive process suspension
//! and pause each other. Each is persisted as a single tagged value so that
//! "running with an end time" and "paused with a remainder" cannot coexist.
//!
//! ## State Transitions
//!
//! ```text
//! Inactive -> Running -> Paused -> Running -> ... -> Inactive
//! ```
//!
//! Transitions are pure: they consume the current value and a caller-supplied
//! wall-clock instant, and return the next value. Calling a transition that
//! does not apply (pausing an inactive countdown, resuming a running one)
//! returns the value unchanged, so replayed events are safe no-ops.

use serde::{Deserialize, Serialize};

/// A countdown that is either not running, running toward an absolute end
/// instant, or paused holding its remaining duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Countdown {
    #[default]
    Inactive,
    Running {
        /// Absolute end instant (epoch milliseconds).
        ends_at_ms: u64,
    },
    Paused {
        /// Remaining duration at the moment of pausing (milliseconds).
        remaining_ms: u64,
    },
}

impl Countdown {
    /// Start a countdown of `duration_ms` from `now_ms`, replacing any
    /// previous state.
    pub fn start(now_ms: u64, duration_ms: u64) -> Self {
        Countdown::Running {
            ends_at_ms: now_ms + duration_ms,
        }
    }

    /// Freeze a running countdown, storing the time it still had left.
    pub fn pause(self, now_ms: u64) -> Self {
        match self {
            Countdown::Running { ends_at_ms } => Countdown::Paused {
                remaining_ms: ends_at_ms.saturating_sub(now_ms),
            },
            other => other,
        }
    }

    /// Restart a paused countdown from `now_ms` with its stored remainder.
    pub fn resume(self, now_ms: u64) -> Self {
        match self {
            Countdown::Paused { remaining_ms } => Countdown::Running {
                ends_at_ms: now_ms + remaining_ms,
            },
            other => other,
        }
    }

    /// Discard the countdown entirely.
    pub fn cancel(self) -> Self {
        Countdown::Inactive
    }

    pub fn is_inactive(&self) -> bool {
        matches!(self, Countdown::Inactive)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Countdown::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Countdown::Paused { .. })
    }

    /// The absolute end instant, if currently running.
    pub fn ends_at_ms(&self) -> Option<u64> {
        match self {
            Countdown::Running { ends_at_ms } => Some(*ends_at_ms),
            _ => None,
        }
    }

    /// Milliseconds left at `now_ms`; `None` when inactive.
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        match self {
            Countdown::Inactive => None,
            Countdown::Running { ends_at_ms } => Some(ends_at_ms.saturating_sub(now_ms)),
            Countdown::Paused { remaining_ms } => Some(*remaining_ms),
        }
    }

    /// True when running and the end instant has passed.
    pub fn expired(&self, now_ms: u64) -> bool {
        matches!(self, Countdown::Running { ends_at_ms } if now_ms >= *ends_at_ms)
    }
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
