//! Command-line entry point.

mod commands;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "bumo")]
#[command(about = "Telegram bot relaying the latest post of a Facebook page")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot: poll Telegram and send the daily post (default)
    Run,

    /// Look up the latest post once and print it
    Fetch {
        /// Skip the cache and scrape the page
        #[arg(short, long)]
        force: bool,
    },

    /// List recorded subscriber chats
    Subscribers,

    /// Send the daily post to all subscribers now
    Notify,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::cmd_run(&cli.settings).await,
        Commands::Fetch { force } => commands::cmd_fetch(&cli.settings, force).await,
        Commands::Subscribers => commands::cmd_subscribers(&cli.settings).await,
        Commands::Notify => commands::cmd_notify(&cli.settings).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_is_default() {
        let cli = Cli::parse_from(["bumo", "--store", "memory"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_fetch_force() {
        let cli = Cli::parse_from(["bumo", "fetch", "--force", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Fetch { force: true })));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
