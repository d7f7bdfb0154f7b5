//! fisufba CLI - FisUFBA API server and database bootstrap
//!
//! - `fisufba serve`: run the HTTP API until SIGTERM/Ctrl+C
//! - `fisufba provision`: create the schema and seed reference rows
//!
//! Configuration comes from `fisufba.toml` (or `--config`), overlaid by
//! `FISUFBA_*` environment variables; a `.env` file is loaded first.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use fisufba_server::AppConfig;

mod commands;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "fisufba",
    author,
    version,
    about = "FisUFBA clinic records API",
    long_about = "Serve the FisUFBA JSON API (accounts, sessions, patient forms) backed by \
                  PostgreSQL, and provision the database schema it needs."
)]
struct Cli {
    /// Path to the TOML config file (default: ./fisufba.toml if present)
    #[arg(long, short = 'c', global = true, env = "FISUFBA_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging (ignored when RUST_LOG is set)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Create missing tables and seed groups, permissions and the admin account
    Provision(commands::provision::ProvisionArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be in place before clap reads `env = ...` defaults
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    let config = AppConfig::load(cli.config.as_deref()).context("Invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args, config).await?,
        Commands::Provision(args) => commands::run_provision(args, config).await?,
    }
    Ok(())
}
