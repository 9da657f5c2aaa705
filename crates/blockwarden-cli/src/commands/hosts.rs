use chrono::Local;
use clap::Subcommand;

use blockwarden_core::domain::normalize_domain;

#[derive(Subcommand)]
pub enum HostsAction {
    /// List blocked hosts
    List,
    /// Add a host to the blocklist
    Add { host: String },
    /// Remove a host from the blocklist
    Remove { host: String },
    /// Set the unblock-duration menu (minutes) cards draw from for a host
    Durations {
        host: String,
        #[arg(required = true, num_args = 1..)]
        minutes: Vec<u32>,
    },
}

pub fn run(action: HostsAction) -> Result<(), Box<dyn std::error::Error>> {
    let controller = super::open_controller()?;
    let now = Local::now();

    match action {
        HostsAction::List => {
            let settings = controller.settings().load();
            println!("{}", serde_json::to_string_pretty(&settings.blocked_hosts)?);
        }
        HostsAction::Add { host } => {
            let host = normalize_domain(&host);
            if host.is_empty() {
                return Err("host must not be empty".into());
            }
            let settings = controller.settings().update(|s| {
                if !s.blocked_hosts.contains(&host) {
                    s.blocked_hosts.push(host.clone());
                }
            })?;
            controller.on_settings_changed(now);
            println!("{}", serde_json::to_string_pretty(&settings.blocked_hosts)?);
        }
        HostsAction::Remove { host } => {
            let host = normalize_domain(&host);
            let settings = controller.settings().update(|s| {
                s.blocked_hosts.retain(|h| h != &host);
                s.domain_durations.remove(&host);
            })?;
            controller.on_settings_changed(now);
            println!("{}", serde_json::to_string_pretty(&settings.blocked_hosts)?);
        }
        HostsAction::Durations { host, minutes } => {
            if minutes.iter().any(|m| *m == 0) {
                return Err("durations must be positive minutes".into());
            }
            let host = normalize_domain(&host);
            let mut sorted = minutes;
            sorted.sort_unstable();
            let settings = controller.settings().update(|s| {
                s.domain_durations.insert(host.clone(), sorted.clone());
            })?;
            controller.on_settings_changed(now);
            println!(
                "{}",
                serde_json::to_string_pretty(&settings.domain_durations)?
            );
        }
    }
    Ok(())
}
