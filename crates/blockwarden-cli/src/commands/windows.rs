use chrono::Local;
use clap::Subcommand;

use blockwarden_core::schedule::minute_of_day;
use blockwarden_core::BlockWindow;

#[derive(Subcommand)]
pub enum WindowsAction {
    /// List weekly blocking windows
    List,
    /// Add a window (day 0=Sun..6=Sat, times "HH:MM"; start > end wraps
    /// past midnight)
    Add {
        day: u8,
        start: String,
        end: String,
    },
    /// Remove a window by its list index
    Remove { index: usize },
}

pub fn run(action: WindowsAction) -> Result<(), Box<dyn std::error::Error>> {
    let controller = super::open_controller()?;
    let now = Local::now();

    match action {
        WindowsAction::List => {
            let settings = controller.settings().load();
            println!("{}", serde_json::to_string_pretty(&settings.windows)?);
        }
        WindowsAction::Add { day, start, end } => {
            if day > 6 {
                return Err("day must be 0 (Sunday) through 6 (Saturday)".into());
            }
            if minute_of_day(&start).is_none() || minute_of_day(&end).is_none() {
                return Err("times must be \"HH:MM\" in 24h format".into());
            }
            let settings = controller.settings().update(|s| {
                s.windows.push(BlockWindow { day, start, end });
            })?;
            controller.on_settings_changed(now);
            println!("{}", serde_json::to_string_pretty(&settings.windows)?);
        }
        WindowsAction::Remove { index } => {
            let current = controller.settings().load();
            if index >= current.windows.len() {
                return Err(format!(
                    "no window at index {index} ({} configured)",
                    current.windows.len()
                )
                .into());
            }
            let settings = controller.settings().update(|s| {
                if index < s.windows.len() {
                    s.windows.remove(index);
                }
            })?;
            controller.on_settings_changed(now);
            println!("{}", serde_json::to_string_pretty(&settings.windows)?);
        }
    }
    Ok(())
}
