use chrono::Local;
use clap::Subcommand;

use blockwarden_core::{Countdown, Mode};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print current settings as JSON
    Show,
    /// Enable enforcement
    Enable,
    /// Disable enforcement
    Disable,
    /// Switch enforcement mode
    Mode {
        /// "scheduled" or "focus"
        mode: String,
    },
    /// Reset settings, ledger and card state to defaults
    Reset,
}

pub fn run(action: SettingsAction) -> Result<(), Box<dyn std::error::Error>> {
    let controller = super::open_controller()?;
    let now = Local::now();

    match action {
        SettingsAction::Show => {
            let settings = controller.settings().load();
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Enable => {
            let settings = controller.settings().update(|s| s.enabled = true)?;
            controller.on_settings_changed(now);
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Disable => {
            let settings = controller.settings().update(|s| s.enabled = false)?;
            controller.on_settings_changed(now);
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Mode { mode } => {
            let mode = match mode.as_str() {
                "scheduled" => Mode::Scheduled,
                "focus" => Mode::Focus,
                other => return Err(format!("unknown mode '{other}'").into()),
            };
            let settings = controller.settings().update(|s| {
                s.mode = mode;
                if mode == Mode::Scheduled {
                    s.focus_timer = Countdown::Inactive;
                }
            })?;
            controller.on_settings_changed(now);
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Reset => {
            controller.reset_to_defaults(now)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&controller.settings().load())?
            );
        }
    }
    Ok(())
}
