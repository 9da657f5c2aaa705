use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "blockwarden-cli", version, about = "Blockwarden CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Settings management
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Blocked host management
    Hosts {
        #[command(subcommand)]
        action: commands::hosts::HostsAction,
    },
    /// Weekly window management
    Windows {
        #[command(subcommand)]
        action: commands::windows::WindowsAction,
    },
    /// Focus session control
    Focus {
        #[command(subcommand)]
        action: commands::focus::FocusAction,
    },
    /// Temporary unblock ledger
    Unblock {
        #[command(subcommand)]
        action: commands::unblock::UnblockAction,
    },
    /// Card gamble rounds
    Cards {
        #[command(subcommand)]
        action: commands::cards::CardsAction,
    },
    /// Run the background controller until interrupted
    Run,
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Hosts { action } => commands::hosts::run(action),
        Commands::Windows { action } => commands::windows::run(action),
        Commands::Focus { action } => commands::focus::run(action),
        Commands::Unblock { action } => commands::unblock::run(action),
        Commands::Cards { action } => commands::cards::run(action),
        Commands::Run => commands::daemon::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
