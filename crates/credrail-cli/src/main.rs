//! # credrail CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

/// Credrail — credential orchestration service toolchain.
///
/// Runs the orchestration API, resets demo data, and inspects
/// proof-detail payloads from the credential platform.
#[derive(Parser, Debug)]
#[command(name = "credrail", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the orchestration API service.
    Serve(credrail_cli::serve::ServeArgs),
    /// Delete all demo workflow records.
    ResetDemo(credrail_cli::reset::ResetArgs),
    /// Flatten a proof-detail JSON file into its attribute map.
    Normalize(credrail_cli::normalize::NormalizeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins when set; otherwise -v flags choose the level.
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => match cli.verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        },
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve(args) => credrail_cli::serve::run(args).await,
        Commands::ResetDemo(args) => credrail_cli::reset::run(args).await,
        Commands::Normalize(args) => credrail_cli::normalize::run(args),
    }
}
