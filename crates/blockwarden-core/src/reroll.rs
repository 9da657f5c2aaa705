//! The reroll/gamble state machine.
//!
//! Three cards are drawn per round; each is either a domain exemption or a
//! bonus reroll. Rounds are gated by a reroll-reset countdown with a random
//! [30,60]-minute duration. While the user is choosing, the focus timer is
//! paused; while a chosen exemption runs, the reset countdown is paused.
//! Those two couplings are the whole point of this machine.
//!
//! ## Phases
//!
//! ```text
//! Inactive -> CountdownRunning -> Selectable -> Locked -> CountdownRunning
//! ```
//!
//! Every transition is a read-modify-write against the persisted record;
//! replaying a transition whose inputs have not changed is a no-op, so a
//! suspended and resumed host cannot corrupt the round.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::alarms::{AlarmService, REROLL_RESET_ALARM};
use crate::countdown::Countdown;
use crate::error::{CoreError, Result};
use crate::ledger::UnblockLedger;
use crate::settings::{Mode, SettingsStore};
use crate::storage::{read_or_default, write_json, Partition, StorageArea, REROLL_STATE_KEY};

/// Rerolls granted when a round opens.
pub const INITIAL_REROLLS: u32 = 3;
/// Cards per round.
pub const CARD_COUNT: usize = 3;
/// Reset-countdown duration bounds, minutes.
pub const RESET_MIN_MINUTES: u64 = 30;
pub const RESET_MAX_MINUTES: u64 = 60;
/// Fallback unblock-duration bounds for hosts without a configured menu.
const FALLBACK_MIN_MINUTES: u32 = 5;
const FALLBACK_MAX_MINUTES: u32 = 120;
/// Probability of drawing a bonus-reroll card when domains exist.
const BONUS_PROBABILITY: f64 = 0.1;

/// One card in a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CardOption {
    Domain {
        domain: String,
        duration_minutes: u32,
    },
    BonusReroll {
        amount: u32,
    },
}

/// Persisted reroll-round state (local partition, single instance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerollState {
    pub available_rerolls: u32,
    #[serde(default)]
    pub reset_timer: Countdown,
    #[serde(default)]
    pub cards: Vec<CardOption>,
    pub selected_card: Option<usize>,
    pub cards_locked: bool,
    pub selected_card_expires_at_ms: Option<u64>,
}

impl Default for RerollState {
    fn default() -> Self {
        Self {
            available_rerolls: 0,
            reset_timer: Countdown::Inactive,
            cards: Vec::new(),
            selected_card: None,
            cards_locked: true,
            selected_card_expires_at_ms: None,
        }
    }
}

/// Derived phase of the machine; not stored, recomputed from the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Inactive,
    CountdownRunning,
    Selectable,
    Locked,
}

impl RerollState {
    pub fn phase(&self) -> Phase {
        if self.selected_card.is_some() {
            Phase::Locked
        } else if !self.cards.is_empty() && !self.cards_locked {
            Phase::Selectable
        } else if !self.reset_timer.is_inactive() {
            Phase::CountdownRunning
        } else {
            Phase::Inactive
        }
    }
}

// ── Draw rules ───────────────────────────────────────────────────────

/// Draw one card.
///
/// With no candidate domains the draw is always a bonus reroll. Otherwise
/// 10% bonus / 90% domain, with the domain picked uniformly and its duration
/// taken uniformly from the configured menu, or from [5,120] minutes when no
/// menu exists.
pub fn generate_random_option<R: Rng + ?Sized>(
    rng: &mut R,
    domains: &[String],
    durations: &std::collections::BTreeMap<String, Vec<u32>>,
) -> CardOption {
    if domains.is_empty() {
        return CardOption::BonusReroll { amount: 1 };
    }
    if rng.gen::<f64>() < BONUS_PROBABILITY {
        return CardOption::BonusReroll { amount: 1 };
    }
    let domain = domains[rng.gen_range(0..domains.len())].clone();
    let duration_minutes = match durations.get(&domain) {
        Some(menu) if !menu.is_empty() => menu[rng.gen_range(0..menu.len())],
        _ => rng.gen_range(FALLBACK_MIN_MINUTES..=FALLBACK_MAX_MINUTES),
    };
    CardOption::Domain {
        domain,
        duration_minutes,
    }
}

/// Draw a full round of cards.
pub fn draw_cards<R: Rng + ?Sized>(
    rng: &mut R,
    domains: &[String],
    durations: &std::collections::BTreeMap<String, Vec<u32>>,
) -> Vec<CardOption> {
    (0..CARD_COUNT)
        .map(|_| generate_random_option(rng, domains, durations))
        .collect()
}

/// A fresh reset-countdown duration, uniform over [30,60] minutes.
pub fn random_reset_duration_ms<R: Rng + ?Sized>(rng: &mut R) -> u64 {
    rng.gen_range(RESET_MIN_MINUTES * 60_000..=RESET_MAX_MINUTES * 60_000)
}

// ── The machine ──────────────────────────────────────────────────────

/// Storage-backed reroll state machine.
///
/// Constructed per event over shared handles; holds no in-memory state of
/// its own, so ephemeral embedders reconstruct their view by loading.
#[derive(Clone)]
pub struct RerollMachine {
    store: Arc<dyn StorageArea>,
    settings: SettingsStore,
    ledger: UnblockLedger,
    alarms: Arc<dyn AlarmService>,
}

impl RerollMachine {
    pub fn new(
        store: Arc<dyn StorageArea>,
        settings: SettingsStore,
        ledger: UnblockLedger,
        alarms: Arc<dyn AlarmService>,
    ) -> Self {
        Self {
            store,
            settings,
            ledger,
            alarms,
        }
    }

    /// Load the persisted record; absent or unreadable yields the inactive
    /// default.
    pub fn load(&self) -> RerollState {
        read_or_default(self.store.as_ref(), Partition::Local, REROLL_STATE_KEY)
    }

    fn save(&self, state: &RerollState) -> Result<()> {
        write_json(self.store.as_ref(), Partition::Local, REROLL_STATE_KEY, state)
    }

    /// Re-arm the reset alarm from persisted state after a process restart.
    pub fn rearm(&self) {
        if let Some(ends_at_ms) = self.load().reset_timer.ends_at_ms() {
            self.alarms.create_at(REROLL_RESET_ALARM, ends_at_ms);
        }
    }

    /// Focus mode came on with no round in flight: start the wait for the
    /// first card drop.
    pub fn on_focus_activated<R: Rng + ?Sized>(
        &self,
        now_ms: u64,
        rng: &mut R,
    ) -> Result<RerollState> {
        let mut state = self.load();
        if state.phase() != Phase::Inactive {
            return Ok(state);
        }
        state.reset_timer = Countdown::start(now_ms, random_reset_duration_ms(rng));
        state.cards.clear();
        state.cards_locked = true;
        state.available_rerolls = 0;
        state.selected_card = None;
        state.selected_card_expires_at_ms = None;
        if let Some(ends_at_ms) = state.reset_timer.ends_at_ms() {
            self.alarms.create_at(REROLL_RESET_ALARM, ends_at_ms);
        }
        self.save(&state)?;
        tracing::debug!("reroll countdown armed");
        Ok(state)
    }

    /// The reset countdown fired: open a round. Pauses the focus timer so
    /// choosing does not eat into the session.
    pub fn on_countdown_fired<R: Rng + ?Sized>(
        &self,
        now_ms: u64,
        rng: &mut R,
    ) -> Result<RerollState> {
        let mut state = self.load();
        if state.selected_card.is_some() {
            // A locked selection means the countdown was paused; a straggler
            // fire event from before the pause must not reopen the round.
            return Ok(state);
        }
        let settings = self.settings.update(|s| {
            s.focus_timer = s.focus_timer.pause(now_ms);
        })?;
        state.reset_timer = Countdown::Inactive;
        state.available_rerolls = INITIAL_REROLLS;
        state.cards = draw_cards(rng, &settings.blocked_hosts, &settings.domain_durations);
        state.cards_locked = false;
        state.selected_card = None;
        state.selected_card_expires_at_ms = None;
        self.alarms.clear(REROLL_RESET_ALARM);
        self.save(&state)?;
        tracing::info!("cards drawn, focus timer paused");
        Ok(state)
    }

    /// Replace one card with a fresh draw, spending a reroll.
    pub fn reroll_card<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Result<RerollState> {
        let mut state = self.load();
        if state.phase() != Phase::Selectable {
            return Err(CoreError::InvalidTransition("cards are locked".into()));
        }
        if state.available_rerolls == 0 {
            return Err(CoreError::InvalidTransition("no rerolls available".into()));
        }
        if index >= state.cards.len() {
            return Err(CoreError::InvalidValue {
                field: "card".into(),
                message: format!("no card at index {index}"),
            });
        }
        let settings = self.settings.load();
        state.cards[index] =
            generate_random_option(rng, &settings.blocked_hosts, &settings.domain_durations);
        state.available_rerolls -= 1;
        self.save(&state)?;
        Ok(state)
    }

    /// Select a card.
    ///
    /// Bonus cards are free actions: the budget grows, the card is redrawn,
    /// the round stays open. Domain cards end the round: the exemption is
    /// written to the ledger, every card locks, and a running reset
    /// countdown is paused so it does not compete with the exemption.
    pub fn select_card<R: Rng + ?Sized>(
        &self,
        index: usize,
        now_ms: u64,
        rng: &mut R,
    ) -> Result<RerollState> {
        let mut state = self.load();
        if state.phase() != Phase::Selectable {
            return Err(CoreError::InvalidTransition("cards are locked".into()));
        }
        let Some(card) = state.cards.get(index).cloned() else {
            return Err(CoreError::InvalidValue {
                field: "card".into(),
                message: format!("no card at index {index}"),
            });
        };
        match card {
            CardOption::BonusReroll { amount } => {
                state.available_rerolls += amount;
                let settings = self.settings.load();
                state.cards[index] =
                    generate_random_option(rng, &settings.blocked_hosts, &settings.domain_durations);
                self.save(&state)?;
            }
            CardOption::Domain {
                domain,
                duration_minutes,
            } => {
                let expires_at_ms = now_ms + u64::from(duration_minutes) * 60_000;
                self.ledger.add(&domain, expires_at_ms, now_ms)?;
                state.available_rerolls = 0;
                state.selected_card = Some(index);
                state.cards_locked = true;
                state.selected_card_expires_at_ms = Some(expires_at_ms);
                if state.reset_timer.is_running() {
                    state.reset_timer = state.reset_timer.pause(now_ms);
                    self.alarms.clear(REROLL_RESET_ALARM);
                }
                self.save(&state)?;
                tracing::info!(%domain, duration_minutes, "exemption card locked in");
            }
        }
        Ok(state)
    }

    /// Explicitly cancel the locked selection: the ledger entry goes away
    /// immediately and the next round's wait begins.
    pub fn cancel_selected<R: Rng + ?Sized>(
        &self,
        now_ms: u64,
        rng: &mut R,
    ) -> Result<RerollState> {
        let state = self.load();
        let Some(index) = state.selected_card else {
            return Err(CoreError::InvalidTransition("no selected card".into()));
        };
        if let Some(CardOption::Domain { domain, .. }) = state.cards.get(index) {
            self.ledger.remove(domain, now_ms)?;
        }
        self.release(state, now_ms, rng)
    }

    /// Release a locked selection whose exemption has run out. The ledger
    /// entry is left to expire on its own. Safe to call on every sweep.
    pub fn settle_selected_expiry<R: Rng + ?Sized>(
        &self,
        now_ms: u64,
        rng: &mut R,
    ) -> Result<RerollState> {
        let state = self.load();
        match state.selected_card_expires_at_ms {
            Some(expires_at_ms) if state.selected_card.is_some() && expires_at_ms <= now_ms => {
                self.release(state, now_ms, rng)
            }
            _ => Ok(state),
        }
    }

    /// Common tail of expiry and cancellation: clear the selection, resume
    /// the focus timer, and restart the reset countdown (paused remainder if
    /// one exists, otherwise a fresh random duration).
    fn release<R: Rng + ?Sized>(
        &self,
        mut state: RerollState,
        now_ms: u64,
        rng: &mut R,
    ) -> Result<RerollState> {
        state.selected_card = None;
        state.selected_card_expires_at_ms = None;
        state.cards.clear();
        state.cards_locked = true;
        state.available_rerolls = 0;

        let settings = self.settings.update(|s| {
            s.focus_timer = s.focus_timer.resume(now_ms);
        })?;

        if settings.mode == Mode::Focus {
            state.reset_timer = match state.reset_timer {
                Countdown::Paused { .. } => state.reset_timer.resume(now_ms),
                Countdown::Running { .. } => state.reset_timer,
                Countdown::Inactive => Countdown::start(now_ms, random_reset_duration_ms(rng)),
            };
            if let Some(ends_at_ms) = state.reset_timer.ends_at_ms() {
                self.alarms.create_at(REROLL_RESET_ALARM, ends_at_ms);
            }
        } else {
            // Focus mode went away while the selection was locked; nothing
            // left to wait for.
            state.reset_timer = Countdown::Inactive;
            self.alarms.clear(REROLL_RESET_ALARM);
        }
        self.save(&state)?;
        Ok(state)
    }

    /// Focus mode went off with nothing locked: drop the round entirely.
    pub fn on_focus_deactivated(&self) -> Result<RerollState> {
        let state = self.load();
        if state.selected_card.is_some() || state.phase() == Phase::Inactive {
            return Ok(state);
        }
        let state = RerollState::default();
        self.alarms.clear(REROLL_RESET_ALARM);
        self.save(&state)?;
        Ok(state)
    }

    /// Full reset: clears ledger and round state unconditionally, then
    /// redraws an open round if any domains are configured.
    pub fn reset_all<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RerollState> {
        self.ledger.clear_all()?;
        self.alarms.clear(REROLL_RESET_ALARM);
        let settings = self.settings.load();
        let mut state = RerollState::default();
        if !settings.blocked_hosts.is_empty() {
            state.cards = draw_cards(rng, &settings.blocked_hosts, &settings.domain_durations);
            state.cards_locked = false;
            state.available_rerolls = INITIAL_REROLLS;
        }
        self.save(&state)?;
        Ok(state)
    }

    /// Message-contract entry: arm the reset countdown for an absolute
    /// instant supplied by an attached UI surface.
    pub fn schedule_reset_at(&self, fire_at_ms: u64) -> Result<RerollState> {
        let mut state = self.load();
        state.reset_timer = Countdown::Running {
            ends_at_ms: fire_at_ms,
        };
        self.alarms.create_at(REROLL_RESET_ALARM, fire_at_ms);
        self.save(&state)?;
        Ok(state)
    }

    /// Message-contract entry: disarm the reset countdown.
    pub fn cancel_reset(&self) -> Result<RerollState> {
        let mut state = self.load();
        state.reset_timer = Countdown::Inactive;
        self.alarms.clear(REROLL_RESET_ALARM);
        self.save(&state)?;
        Ok(state)
    }
}
