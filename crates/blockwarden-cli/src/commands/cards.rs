use chrono::Local;
use clap::Subcommand;
use serde_json::json;

use blockwarden_core::Phase;

#[derive(Subcommand)]
pub enum CardsAction {
    /// Print the current round as JSON
    Show,
    /// Reroll one card (0-based index), spending a reroll
    Reroll { index: usize },
    /// Select a card (0-based index)
    Select { index: usize },
    /// Cancel the locked selection and its unblock
    Cancel,
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Inactive => "inactive",
        Phase::CountdownRunning => "countdown",
        Phase::Selectable => "selectable",
        Phase::Locked => "locked",
    }
}

pub fn run(action: CardsAction) -> Result<(), Box<dyn std::error::Error>> {
    let controller = super::open_controller()?;
    let now = Local::now();
    let now_ms = now.timestamp_millis() as u64;
    let machine = controller.reroll();
    let mut rng = rand::thread_rng();

    // A locked card whose exemption already lapsed is released before any
    // action is interpreted, the same way the daemon's sweep would.
    machine.settle_selected_expiry(now_ms, &mut rng)?;

    let state = match action {
        CardsAction::Show => machine.load(),
        CardsAction::Reroll { index } => machine.reroll_card(index, &mut rng)?,
        CardsAction::Select { index } => machine.select_card(index, now_ms, &mut rng)?,
        CardsAction::Cancel => machine.cancel_selected(now_ms, &mut rng)?,
    };

    let snapshot = json!({
        "phase": phase_name(state.phase()),
        "state": state,
        "countdown_remaining_ms": state.reset_timer.remaining_ms(now_ms),
    });
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
