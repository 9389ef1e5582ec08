//! Siteline CLI - Database migrations and session inspection.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! siteline migrate
//!
//! # Show a connect session by its callback token
//! siteline session show abc123
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "siteline")]
#[command(author, version, about = "Siteline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect connect sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Show a connect session's status
    Show {
        /// Callback token (`fp_cot`)
        fp_cot: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Session { action } => match action {
            SessionAction::Show { fp_cot } => commands::session::show(&fp_cot).await?,
        },
    }
    Ok(())
}
