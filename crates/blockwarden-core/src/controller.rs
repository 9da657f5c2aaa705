//! The mode/blocking controller.
//!
//! Holds no state of its own: every invocation recomputes the blocking
//! decision from the persisted settings and ledger, applies enforcement,
//! and re-arms the single decision alarm for the next boundary. The four
//! event sources (startup, settings change, navigation completed, alarm
//! fire) all funnel into the same refresh path, so overlapping or replayed
//! events converge on the same persisted outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::alarms::{AlarmService, BOUNDARY_ALARM, CLEANUP_ALARM, REROLL_RESET_ALARM};
use crate::contexts::{ContextHost, OpenContext};
use crate::countdown::Countdown;
use crate::domain::is_blocked_url;
use crate::ledger::UnblockLedger;
use crate::reroll::{Phase, RerollMachine};
use crate::schedule::{is_within_any_window, next_boundary_after};
use crate::settings::{Mode, Settings, SettingsStore};
use crate::storage::StorageArea;

const MINUTE_MS: u64 = 60_000;
const DAY_MS: u64 = 24 * 60 * 60_000;

/// Outcome of one decision pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub should_block: bool,
    /// When the decision can next change (epoch milliseconds).
    pub next_check_ms: u64,
}

/// Compute the blocking decision for `now`.
///
/// Pure: no storage reads, no side effects. The caller supplies a zoned
/// instant so scheduled mode can evaluate local wall time.
pub fn decide<Tz: TimeZone>(now: DateTime<Tz>, settings: &Settings) -> Decision {
    let now_ms = now.timestamp_millis() as u64;
    match settings.mode {
        Mode::Focus => match settings.focus_timer {
            Countdown::Paused { .. } => Decision {
                should_block: false,
                next_check_ms: now_ms + MINUTE_MS,
            },
            Countdown::Running { ends_at_ms } => Decision {
                should_block: settings.enabled && now_ms < ends_at_ms,
                next_check_ms: ends_at_ms.min(now_ms + DAY_MS),
            },
            Countdown::Inactive => Decision {
                should_block: false,
                next_check_ms: now_ms + DAY_MS,
            },
        },
        Mode::Scheduled => {
            let local = now.naive_local();
            let should_block = settings.enabled && is_within_any_window(local, &settings.windows);
            let boundary = next_boundary_after(local, &settings.windows);
            let next_check_ms = now
                .timezone()
                .from_local_datetime(&boundary)
                .earliest()
                .map(|instant| instant.timestamp_millis() as u64)
                // A boundary landing in a nonexistent wall time (DST gap)
                // degrades to a plain 24h re-check.
                .unwrap_or(now_ms + DAY_MS);
            Decision {
                should_block,
                next_check_ms: next_check_ms.max(now_ms + 1_000),
            }
        }
    }
}

/// Long-lived (but freely re-constructible) blocking controller.
pub struct Controller {
    settings: SettingsStore,
    ledger: UnblockLedger,
    reroll: RerollMachine,
    alarms: Arc<dyn AlarmService>,
    contexts: Arc<dyn ContextHost>,
    retry_delay: Duration,
}

impl Controller {
    pub fn new(
        store: Arc<dyn StorageArea>,
        alarms: Arc<dyn AlarmService>,
        contexts: Arc<dyn ContextHost>,
    ) -> Self {
        let settings = SettingsStore::new(store.clone());
        let ledger = UnblockLedger::new(store.clone());
        let reroll = RerollMachine::new(store, settings.clone(), ledger.clone(), alarms.clone());
        Self {
            settings,
            ledger,
            reroll,
            alarms,
            contexts,
            retry_delay: Duration::from_millis(100),
        }
    }

    /// Override the enforcement retry delay (tests use zero).
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn ledger(&self) -> &UnblockLedger {
        &self.ledger
    }

    pub fn reroll(&self) -> &RerollMachine {
        &self.reroll
    }

    /// Recompute the decision, enforce it, and re-arm the decision alarm.
    pub fn refresh<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Decision {
        let now_ms = now.timestamp_millis() as u64;
        let mut settings = self.settings.load();

        // A focus session that ran out while the process slept reverts to
        // the weekly schedule.
        if settings.mode == Mode::Focus && settings.focus_timer.expired(now_ms) {
            settings.mode = Mode::Scheduled;
            settings.focus_timer = Countdown::Inactive;
            if let Err(e) = self.settings.save(&settings) {
                tracing::warn!(error = %e, "failed to persist focus-session expiry");
            }
        }

        let decision = decide(now, &settings);
        if decision.should_block {
            self.enforce(&settings, now_ms);
        }
        self.alarms.create_at(BOUNDARY_ALARM, decision.next_check_ms);
        tracing::debug!(
            should_block = decision.should_block,
            next_check_ms = decision.next_check_ms,
            "decision refreshed"
        );
        decision
    }

    /// Bring the reroll machine in line with the current focus-mode state.
    ///
    /// Reconciliation rather than edge detection: replaying it against an
    /// unchanged record does nothing, and a missed activation event is
    /// repaired on the next call.
    pub fn reconcile_reroll<Tz: TimeZone>(&self, now: DateTime<Tz>) {
        let now_ms = now.timestamp_millis() as u64;
        let settings = self.settings.load();
        let state = self.reroll.load();
        let focus_engaged = settings.mode == Mode::Focus && !settings.focus_timer.is_inactive();
        let result = match (focus_engaged, state.phase()) {
            (true, Phase::Inactive) => self
                .reroll
                .on_focus_activated(now_ms, &mut rand::thread_rng())
                .map(drop),
            (false, Phase::CountdownRunning | Phase::Selectable) => {
                self.reroll.on_focus_deactivated().map(drop)
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "reroll reconciliation failed");
        }
    }

    /// Process start/resume: arm the periodic sweep, restore the reroll
    /// alarm from persistence, then decide.
    pub fn on_startup<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Decision {
        self.alarms
            .create_periodic(CLEANUP_ALARM, Duration::from_secs(60));
        self.reroll.rearm();
        self.reconcile_reroll(now.clone());
        self.refresh(now)
    }

    /// The persisted settings record changed (any writer).
    pub fn on_settings_changed<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Decision {
        let decision = self.refresh(now.clone());
        self.reconcile_reroll(now);
        decision
    }

    /// A navigation finished in some context; blocks reachable through
    /// cache or redirect are caught here rather than by the boundary alarm.
    pub fn on_navigation_completed<Tz: TimeZone>(&self, context: &OpenContext, now: DateTime<Tz>) {
        let now_ms = now.timestamp_millis() as u64;
        let settings = self.settings.load();
        let decision = decide(now, &settings);
        if !decision.should_block || settings.blocked_hosts.is_empty() {
            return;
        }
        if is_blocked_url(&context.url, &settings.blocked_hosts)
            && !self.ledger.is_temporarily_unblocked(&context.url, now_ms)
        {
            self.close_with_retry(context.id, &context.url);
        }
    }

    /// A named wake timer fired.
    pub fn on_alarm<Tz: TimeZone>(&self, name: &str, now: DateTime<Tz>) {
        let now_ms = now.timestamp_millis() as u64;
        match name {
            BOUNDARY_ALARM => {
                self.refresh(now);
            }
            CLEANUP_ALARM => {
                if let Err(e) = self.ledger.cleanup_expired(now_ms) {
                    tracing::warn!(error = %e, "ledger sweep failed");
                }
                // A locked card whose exemption lapsed is released on the
                // same sweep.
                if let Err(e) = self
                    .reroll
                    .settle_selected_expiry(now_ms, &mut rand::thread_rng())
                {
                    tracing::warn!(error = %e, "card expiry settlement failed");
                }
            }
            REROLL_RESET_ALARM => {
                if let Err(e) = self.reroll.on_countdown_fired(now_ms, &mut rand::thread_rng()) {
                    tracing::warn!(error = %e, "reroll countdown handling failed");
                }
            }
            other => {
                tracing::debug!(name = other, "ignoring unknown alarm");
            }
        }
    }

    /// Reset settings, ledger and card state to factory defaults, then
    /// re-decide from scratch.
    pub fn reset_to_defaults<Tz: TimeZone>(&self, now: DateTime<Tz>) -> crate::error::Result<()> {
        self.settings.save(&Settings::default())?;
        self.reroll.reset_all(&mut rand::thread_rng())?;
        self.refresh(now);
        Ok(())
    }

    /// Close every open context on a blocked, non-exempt host.
    fn enforce(&self, settings: &Settings, now_ms: u64) {
        if settings.blocked_hosts.is_empty() {
            return;
        }
        for context in self.contexts.enumerate() {
            if is_blocked_url(&context.url, &settings.blocked_hosts)
                && !self.ledger.is_temporarily_unblocked(&context.url, now_ms)
            {
                self.close_with_retry(context.id, &context.url);
            }
        }
    }

    /// One retry after a fixed delay, then log and abandon; the next
    /// scheduled re-check picks the context up again.
    fn close_with_retry(&self, id: u64, url: &str) {
        let Err(first) = self.contexts.close(id) else {
            return;
        };
        tracing::debug!(url, error = %first, "context close failed, retrying");
        std::thread::sleep(self.retry_delay);
        if let Err(second) = self.contexts.close(id) {
            tracing::warn!(url, error = %second, "context close failed twice, giving up");
        }
    }
}
