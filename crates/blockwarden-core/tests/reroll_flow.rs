//! End-to-end reroll-round scenarios, including the two countdown couplings:
//! opening a round pauses the focus timer, and locking a card pauses the
//! reset countdown until the exemption is over.

use std::sync::Arc;

use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;

use blockwarden_core::alarms::REROLL_RESET_ALARM;
use blockwarden_core::storage::{write_json, Partition, REROLL_STATE_KEY};
use blockwarden_core::{
    AlarmService, CardOption, Countdown, FakeContexts, MemoryAlarms, MemoryStore, Mode, Phase, RerollMachine,
    RerollState, Settings, SettingsStore, UnblockLedger,
};

struct Rig {
    store: Arc<MemoryStore>,
    alarms: Arc<MemoryAlarms>,
    settings: SettingsStore,
    ledger: UnblockLedger,
    machine: RerollMachine,
}

fn rig() -> Rig {
    let store = Arc::new(MemoryStore::new());
    let alarms = Arc::new(MemoryAlarms::new());
    let settings = SettingsStore::new(store.clone());
    let ledger = UnblockLedger::new(store.clone());
    let machine = RerollMachine::new(
        store.clone(),
        settings.clone(),
        ledger.clone(),
        alarms.clone(),
    );
    Rig {
        store,
        alarms,
        settings,
        ledger,
        machine,
    }
}

fn rng() -> Mcg128Xsl64 {
    Mcg128Xsl64::seed_from_u64(2026)
}

fn focus_running(now_ms: u64, remaining_ms: u64) -> Settings {
    Settings {
        mode: Mode::Focus,
        focus_timer: Countdown::Running {
            ends_at_ms: now_ms + remaining_ms,
        },
        blocked_hosts: vec!["x.com".into(), "youtube.com".into()],
        ..Settings::default()
    }
}

/// Seed a selectable round with known cards, bypassing the draw.
fn seed_selectable(rig: &Rig, cards: Vec<CardOption>, reset_timer: Countdown) {
    let state = RerollState {
        available_rerolls: 3,
        reset_timer,
        cards,
        selected_card: None,
        cards_locked: false,
        selected_card_expires_at_ms: None,
    };
    write_json(rig.store.as_ref(), Partition::Local, REROLL_STATE_KEY, &state).unwrap();
}

#[test]
fn activation_arms_a_random_countdown_within_bounds() {
    let rig = rig();
    let now_ms = 1_000_000;
    rig.settings.save(&focus_running(now_ms, 7_200_000)).unwrap();

    let state = rig.machine.on_focus_activated(now_ms, &mut rng()).unwrap();
    assert_eq!(state.phase(), Phase::CountdownRunning);

    let ends_at = state.reset_timer.ends_at_ms().unwrap();
    let duration = ends_at - now_ms;
    assert!((30 * 60_000..=60 * 60_000).contains(&duration));
    assert_eq!(rig.alarms.armed_at(REROLL_RESET_ALARM), Some(ends_at));

    // Re-running the activation with a round in flight changes nothing.
    let again = rig.machine.on_focus_activated(now_ms + 5_000, &mut rng()).unwrap();
    assert_eq!(again, state);
}

#[test]
fn countdown_fire_pauses_focus_timer_and_opens_round() {
    let rig = rig();
    let now_ms = 1_000_000;
    rig.settings.save(&focus_running(now_ms, 7_200_000)).unwrap();
    rig.machine.on_focus_activated(now_ms, &mut rng()).unwrap();

    // Fire 40 minutes in: 80 minutes of focus should remain.
    let fire_ms = now_ms + 40 * 60_000;
    let state = rig.machine.on_countdown_fired(fire_ms, &mut rng()).unwrap();

    assert_eq!(state.phase(), Phase::Selectable);
    assert_eq!(state.available_rerolls, 3);
    assert_eq!(state.cards.len(), 3);
    assert!(state.reset_timer.is_inactive());
    assert_eq!(rig.alarms.armed(REROLL_RESET_ALARM), None);

    // The focus timer switched to paused-with-remainder in the same
    // transition.
    let settings = rig.settings.load();
    assert_eq!(
        settings.focus_timer,
        Countdown::Paused {
            remaining_ms: 80 * 60_000
        }
    );
}

#[test]
fn selecting_a_domain_card_writes_the_ledger_and_locks() {
    let rig = rig();
    let now_ms = 2_000_000;
    rig.settings.save(&focus_running(now_ms, 7_200_000)).unwrap();
    seed_selectable(
        &rig,
        vec![
            CardOption::Domain {
                domain: "x.com".into(),
                duration_minutes: 10,
            },
            CardOption::BonusReroll { amount: 1 },
            CardOption::Domain {
                domain: "youtube.com".into(),
                duration_minutes: 25,
            },
        ],
        Countdown::Inactive,
    );

    let state = rig.machine.select_card(0, now_ms, &mut rng()).unwrap();

    assert_eq!(state.phase(), Phase::Locked);
    assert_eq!(state.available_rerolls, 0);
    assert!(state.cards_locked);
    assert_eq!(
        state.selected_card_expires_at_ms,
        Some(now_ms + 10 * 60_000)
    );

    let active = rig.ledger.get_active(now_ms);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].domain, "x.com");
    assert_eq!(active[0].expires_at_ms, now_ms + 10 * 60_000);

    // Locked cards reject further selection and rerolls.
    assert!(rig.machine.select_card(2, now_ms, &mut rng()).is_err());
    assert!(rig.machine.reroll_card(1, &mut rng()).is_err());
}

#[test]
fn selecting_while_countdown_runs_pauses_it() {
    let rig = rig();
    let now_ms = 2_000_000;
    rig.settings.save(&focus_running(now_ms, 7_200_000)).unwrap();
    seed_selectable(
        &rig,
        vec![
            CardOption::Domain {
                domain: "x.com".into(),
                duration_minutes: 10,
            },
            CardOption::BonusReroll { amount: 1 },
            CardOption::BonusReroll { amount: 1 },
        ],
        Countdown::Running {
            ends_at_ms: now_ms + 20 * 60_000,
        },
    );
    rig.alarms.create_at(REROLL_RESET_ALARM, now_ms + 20 * 60_000);

    let state = rig.machine.select_card(0, now_ms, &mut rng()).unwrap();

    assert_eq!(
        state.reset_timer,
        Countdown::Paused {
            remaining_ms: 20 * 60_000
        }
    );
    assert_eq!(rig.alarms.armed(REROLL_RESET_ALARM), None);
}

#[test]
fn canceling_a_selection_restarts_the_round_wait() {
    let rig = rig();
    let now_ms = 2_000_000;
    rig.settings.save(&focus_running(now_ms, 7_200_000)).unwrap();
    seed_selectable(
        &rig,
        vec![
            CardOption::Domain {
                domain: "x.com".into(),
                duration_minutes: 10,
            },
            CardOption::BonusReroll { amount: 1 },
            CardOption::BonusReroll { amount: 1 },
        ],
        Countdown::Inactive,
    );
    rig.machine.select_card(0, now_ms, &mut rng()).unwrap();

    // Pause the focus timer the way an open round would have.
    rig.settings
        .update(|s| s.focus_timer = Countdown::Paused { remaining_ms: 50 * 60_000 })
        .unwrap();

    let cancel_ms = now_ms + 3 * 60_000;
    let state = rig.machine.cancel_selected(cancel_ms, &mut rng()).unwrap();

    // Ledger entry is gone immediately.
    assert!(rig.ledger.get_active(cancel_ms).is_empty());

    // No paused remainder existed, so a fresh [30,60]-minute wait begins.
    assert_eq!(state.phase(), Phase::CountdownRunning);
    let duration = state.reset_timer.ends_at_ms().unwrap() - cancel_ms;
    assert!((30 * 60_000..=60 * 60_000).contains(&duration));
    assert_eq!(
        rig.alarms.armed_at(REROLL_RESET_ALARM),
        state.reset_timer.ends_at_ms()
    );

    // The focus timer resumed from its stored remainder.
    let settings = rig.settings.load();
    assert_eq!(
        settings.focus_timer,
        Countdown::Running {
            ends_at_ms: cancel_ms + 50 * 60_000
        }
    );
}

#[test]
fn natural_expiry_resumes_a_paused_countdown_remainder() {
    let rig = rig();
    let now_ms = 2_000_000;
    rig.settings.save(&focus_running(now_ms, 7_200_000)).unwrap();
    seed_selectable(
        &rig,
        vec![
            CardOption::Domain {
                domain: "x.com".into(),
                duration_minutes: 10,
            },
            CardOption::BonusReroll { amount: 1 },
            CardOption::BonusReroll { amount: 1 },
        ],
        Countdown::Running {
            ends_at_ms: now_ms + 20 * 60_000,
        },
    );
    rig.machine.select_card(0, now_ms, &mut rng()).unwrap();

    // Before expiry the sweep does nothing.
    let early_ms = now_ms + 5 * 60_000;
    let state = rig.machine.settle_selected_expiry(early_ms, &mut rng()).unwrap();
    assert_eq!(state.phase(), Phase::Locked);

    // After expiry the paused 20-minute remainder resumes.
    let late_ms = now_ms + 11 * 60_000;
    let state = rig.machine.settle_selected_expiry(late_ms, &mut rng()).unwrap();
    assert_eq!(state.phase(), Phase::CountdownRunning);
    assert_eq!(
        state.reset_timer,
        Countdown::Running {
            ends_at_ms: late_ms + 20 * 60_000
        }
    );
}

#[test]
fn bonus_card_is_a_free_action() {
    let rig = rig();
    let now_ms = 2_000_000;
    rig.settings.save(&focus_running(now_ms, 7_200_000)).unwrap();
    seed_selectable(
        &rig,
        vec![
            CardOption::BonusReroll { amount: 1 },
            CardOption::Domain {
                domain: "x.com".into(),
                duration_minutes: 10,
            },
            CardOption::Domain {
                domain: "youtube.com".into(),
                duration_minutes: 15,
            },
        ],
        Countdown::Inactive,
    );

    let state = rig.machine.select_card(0, now_ms, &mut rng()).unwrap();

    assert_eq!(state.phase(), Phase::Selectable);
    assert_eq!(state.available_rerolls, 4);
    assert_eq!(state.cards.len(), 3);
    assert!(state.selected_card.is_none());
    assert!(rig.ledger.get_active(now_ms).is_empty());
}

#[test]
fn rerolls_spend_down_and_run_out() {
    let rig = rig();
    let now_ms = 2_000_000;
    rig.settings.save(&focus_running(now_ms, 7_200_000)).unwrap();
    seed_selectable(
        &rig,
        vec![
            CardOption::BonusReroll { amount: 1 },
            CardOption::BonusReroll { amount: 1 },
            CardOption::BonusReroll { amount: 1 },
        ],
        Countdown::Inactive,
    );

    let mut rng = rng();
    for expected in (0..3).rev() {
        let state = rig.machine.reroll_card(0, &mut rng).unwrap();
        assert_eq!(state.available_rerolls, expected);
    }
    assert!(rig.machine.reroll_card(0, &mut rng).is_err());
}

#[test]
fn focus_deactivation_drops_an_open_round() {
    let rig = rig();
    let now_ms = 1_000_000;
    rig.settings.save(&focus_running(now_ms, 7_200_000)).unwrap();
    rig.machine.on_focus_activated(now_ms, &mut rng()).unwrap();
    assert!(rig.alarms.armed_at(REROLL_RESET_ALARM).is_some());

    let state = rig.machine.on_focus_deactivated().unwrap();
    assert_eq!(state.phase(), Phase::Inactive);
    assert!(state.cards.is_empty());
    assert_eq!(state.available_rerolls, 0);
    assert_eq!(rig.alarms.armed(REROLL_RESET_ALARM), None);
}

#[test]
fn full_reset_clears_everything_and_redraws() {
    let rig = rig();
    let now_ms = 1_000_000;
    rig.settings.save(&focus_running(now_ms, 7_200_000)).unwrap();
    rig.ledger.add("x.com", now_ms + 60_000, now_ms).unwrap();
    rig.machine.on_focus_activated(now_ms, &mut rng()).unwrap();

    let state = rig.machine.reset_all(&mut rng()).unwrap();

    assert!(rig.ledger.get_active(now_ms).is_empty());
    assert_eq!(state.phase(), Phase::Selectable);
    assert_eq!(state.available_rerolls, 3);
    assert_eq!(state.cards.len(), 3);
    assert_eq!(rig.alarms.armed(REROLL_RESET_ALARM), None);
}

#[test]
fn controller_reconciliation_drives_activation_and_teardown() {
    let store = Arc::new(MemoryStore::new());
    let alarms = Arc::new(MemoryAlarms::new());
    let contexts = Arc::new(FakeContexts::new());
    let controller =
        blockwarden_core::Controller::new(store.clone(), alarms.clone(), contexts.clone());

    let now = chrono::Utc::now();
    let now_ms = now.timestamp_millis() as u64;
    SettingsStore::new(store.clone())
        .save(&focus_running(now_ms, 7_200_000))
        .unwrap();

    controller.reconcile_reroll(now);
    assert_eq!(controller.reroll().load().phase(), Phase::CountdownRunning);

    SettingsStore::new(store.clone())
        .update(|s| {
            s.mode = Mode::Scheduled;
            s.focus_timer = Countdown::Inactive;
        })
        .unwrap();
    controller.reconcile_reroll(now);
    assert_eq!(controller.reroll().load().phase(), Phase::Inactive);
}
