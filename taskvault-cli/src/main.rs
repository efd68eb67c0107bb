//! taskvault — publish completed tracker records as a redacted knowledge base.
//!
//! # Usage
//!
//! ```text
//! taskvault init
//! taskvault profiles
//! taskvault sync [--profile <name|index>] [--mode incremental|full] [--created FROM~TO]
//!                [--exclude-section <name>]... [--yes] [--advance-empty] [--qa]
//! taskvault status [--json]
//! taskvault qa [--project <name>]
//! ```

mod clients;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{
    init::InitArgs, profiles::ProfilesArgs, qa::QaArgs, status::StatusArgs, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "taskvault",
    version,
    about = "Turn completed tracker tasks into a redacted Markdown knowledge base",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a settings template to ~/.taskvault/config.yaml.
    Init(InitArgs),

    /// List configured tracker profiles.
    Profiles(ProfilesArgs),

    /// Export completed records of one profile's project.
    Sync(SyncArgs),

    /// Show the last sync time per profile.
    Status(StatusArgs),

    /// Mine question/answer pairs from published artifacts.
    Qa(QaArgs),
}

fn init_tracing(verbose: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::default().add_directive(Level::DEBUG.into()),
        Err(_) => EnvFilter::default().add_directive(Level::INFO.into()),
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Profiles(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Qa(args) => args.run(),
    }
}
