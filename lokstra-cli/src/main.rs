//! `lokstra` — the aggregator binary (spec §6): `lokstra --config <path>
//! [--server <name>]` loads a deployment plan and runs one of its
//! servers until SIGINT/SIGTERM requests a graceful shutdown.

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

/// How long `Server::shutdown` is allowed to drain in-flight requests
/// across every app before the process exits regardless.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "lokstra", version, about = "Run a Lokstra deployment plan")]
struct Args {
    /// Plan file or directory of plan files to load.
    #[arg(long)]
    config: PathBuf,

    /// Select one server from the plan by name (bare or `deployment.server`).
    /// Required when the plan declares more than one server.
    #[arg(long)]
    server: Option<String>,
}

#[tokio::main]
async fn main() {
    // Mirrors `r2e_core::config`'s own startup behaviour: a missing
    // `.env` file is not an error, it just means nothing gets loaded.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".parse().unwrap()))
        .init();

    let args = Args::parse();

    if let Err(e) = lokstra_cli::run(args.config, args.server, SHUTDOWN_TIMEOUT).await {
        eprintln!("{}", format!("fatal: {e}").red());
        std::process::exit(1);
    }
}
