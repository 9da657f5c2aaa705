//! Named wake-timer service.
//!
//! The controller owns exactly three timer names: the single decision
//! boundary, the periodic ledger sweep, and the reroll-reset countdown.
//! Re-arming a name replaces any prior instance, so clearing before
//! re-creating is never required, and clearing an absent name is a no-op.
//!
//! Armed timers are not the source of truth: their fire instants live in the
//! persisted records, and the daemon re-arms everything from persistence on
//! startup. `TokioAlarms` is therefore free to keep its handles in memory.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::countdown::now_ms;

/// Next state boundary for the blocking decision.
pub const BOUNDARY_ALARM: &str = "schedule-boundary";
/// Periodic compaction of expired ledger entries.
pub const CLEANUP_ALARM: &str = "cleanup-unblocks";
/// Reroll-reset countdown expiry.
pub const REROLL_RESET_ALARM: &str = "reroll-reset";

/// Named single-shot and periodic wake timers.
pub trait AlarmService: Send + Sync {
    /// Arm a single-shot timer for an absolute instant, replacing any timer
    /// with the same name. Instants in the past fire as soon as possible.
    fn create_at(&self, name: &str, fire_at_ms: u64);

    /// Arm a periodic timer, replacing any timer with the same name.
    fn create_periodic(&self, name: &str, period: Duration);

    /// Disarm a timer; clearing a non-existent name is a no-op.
    fn clear(&self, name: &str);
}

/// How a recorded alarm was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmedAlarm {
    At(u64),
    Every(Duration),
}

/// Recording alarm service for tests and one-shot CLI invocations, where
/// nothing outlives the process and firing is driven manually.
#[derive(Default)]
pub struct MemoryAlarms {
    armed: Mutex<HashMap<String, ArmedAlarm>>,
}

impl MemoryAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently armed alarm for `name`, if any.
    pub fn armed(&self, name: &str) -> Option<ArmedAlarm> {
        self.armed.lock().ok()?.get(name).copied()
    }

    /// Fire instant of a single-shot alarm, if one is armed.
    pub fn armed_at(&self, name: &str) -> Option<u64> {
        match self.armed(name)? {
            ArmedAlarm::At(ms) => Some(ms),
            ArmedAlarm::Every(_) => None,
        }
    }
}

impl AlarmService for MemoryAlarms {
    fn create_at(&self, name: &str, fire_at_ms: u64) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.insert(name.to_string(), ArmedAlarm::At(fire_at_ms));
        }
    }

    fn create_periodic(&self, name: &str, period: Duration) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.insert(name.to_string(), ArmedAlarm::Every(period));
        }
    }

    fn clear(&self, name: &str) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.remove(name);
        }
    }
}

/// Tokio-backed alarm service for the long-lived daemon.
///
/// Each armed name is a spawned sleep task that sends the name on a channel
/// when it fires; the daemon drains the channel in its event loop. Must be
/// constructed inside a Tokio runtime.
pub struct TokioAlarms {
    tx: tokio::sync::mpsc::UnboundedSender<String>,
    tasks: Mutex<HashMap<String, tokio::task::JoinHandle<()>>>,
}

impl TokioAlarms {
    /// Create the service plus the receiver of fired alarm names.
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (
            Self {
                tx,
                tasks: Mutex::new(HashMap::new()),
            },
            rx,
        )
    }

    fn replace(&self, name: &str, task: tokio::task::JoinHandle<()>) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(old) = tasks.insert(name.to_string(), task) {
                old.abort();
            }
        }
    }
}

impl AlarmService for TokioAlarms {
    fn create_at(&self, name: &str, fire_at_ms: u64) {
        let tx = self.tx.clone();
        let owned = name.to_string();
        let delay = Duration::from_millis(fire_at_ms.saturating_sub(now_ms()));
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(owned);
        });
        self.replace(name, task);
        tracing::debug!(name, fire_at_ms, "armed single-shot alarm");
    }

    fn create_periodic(&self, name: &str, period: Duration) {
        let tx = self.tx.clone();
        let owned = name.to_string();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately; skip it so the alarm behaves
            // like "every `period` from now".
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(owned.clone()).is_err() {
                    break;
                }
            }
        });
        self.replace(name, task);
        tracing::debug!(name, ?period, "armed periodic alarm");
    }

    fn clear(&self, name: &str) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.remove(name) {
                task.abort();
            }
        }
    }
}
