use chrono::Local;
use clap::Subcommand;

use blockwarden_core::Request;

#[derive(Subcommand)]
pub enum UnblockAction {
    /// List active temporary unblocks
    List,
    /// Add a temporary unblock for a domain
    Add {
        domain: String,
        /// Minutes until it expires
        minutes: u64,
    },
    /// Cancel the unblock for a domain
    Cancel { domain: String },
    /// Remove every temporary unblock
    Clear,
}

pub fn run(action: UnblockAction) -> Result<(), Box<dyn std::error::Error>> {
    let controller = super::open_controller()?;
    let now = Local::now();
    let now_ms = now.timestamp_millis() as u64;

    let request = match action {
        UnblockAction::List => Request::GetActiveUnblocks,
        UnblockAction::Add { domain, minutes } => {
            if minutes == 0 {
                return Err("minutes must be positive".into());
            }
            Request::TemporaryUnblock {
                domain,
                expires_at_ms: now_ms + minutes * 60_000,
            }
        }
        UnblockAction::Cancel { domain } => Request::CancelTemporaryUnblock { domain },
        UnblockAction::Clear => Request::ClearTemporaryUnblocks,
    };

    let response = controller.handle_request(request, now);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
