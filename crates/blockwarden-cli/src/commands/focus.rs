use chrono::Local;
use clap::Subcommand;
use serde_json::json;

use blockwarden_core::{decide, Countdown, Mode};

#[derive(Subcommand)]
pub enum FocusAction {
    /// Start a focus session (uses the configured hours when omitted)
    Start { hours: Option<f64> },
    /// Stop the running focus session and fall back to the schedule
    Stop,
    /// Print the focus timer and current blocking decision as JSON
    Status,
}

pub fn run(action: FocusAction) -> Result<(), Box<dyn std::error::Error>> {
    let controller = super::open_controller()?;
    let now = Local::now();
    let now_ms = now.timestamp_millis() as u64;

    match action {
        FocusAction::Start { hours } => {
            if let Some(h) = hours {
                if h <= 0.0 {
                    return Err("hours must be positive".into());
                }
            }
            let settings = controller.settings().update(|s| {
                if let Some(h) = hours {
                    s.focus_hours = h;
                }
                s.mode = Mode::Focus;
                let duration_ms = (s.focus_hours * 3_600_000.0) as u64;
                s.focus_timer = Countdown::start(now_ms, duration_ms);
            })?;
            controller.on_settings_changed(now);
            println!("{}", serde_json::to_string_pretty(&settings.focus_timer)?);
        }
        FocusAction::Stop => {
            let settings = controller.settings().update(|s| {
                s.mode = Mode::Scheduled;
                s.focus_timer = Countdown::Inactive;
            })?;
            controller.on_settings_changed(now);
            println!("{}", serde_json::to_string_pretty(&settings.focus_timer)?);
        }
        FocusAction::Status => {
            let settings = controller.settings().load();
            let decision = decide(now, &settings);
            let status = json!({
                "mode": settings.mode,
                "focus_timer": settings.focus_timer,
                "remaining_ms": settings.focus_timer.remaining_ms(now_ms),
                "decision": decision,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}
