//! HTTP server command
//!
//! Builds the gateway from the loaded configuration and serves the API
//! until SIGTERM or Ctrl+C.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;

use fisufba_server::{run_server, AppConfig, Gateway};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides `server.bind`, default 0.0.0.0:8000)
    #[arg(long, short = 'b', env = "FISUFBA_BIND")]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, config: AppConfig) -> Result<()> {
    let mut server = config.server;
    if let Some(bind) = args.bind {
        server.bind_addr = bind;
    }
    server.cors_permissive |= args.cors_permissive;

    let gateway = Gateway::connect(&config.database)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to database {} at {}:{}",
                config.database.name, config.database.host, config.database.port
            )
        })?;

    tracing::info!(bind = %server.bind_addr, "starting fisufba server");

    // Blocks until shutdown; the gateway is closed before this returns.
    run_server(gateway, server).await.context("Server error")?;

    tracing::info!("server stopped");
    Ok(())
}
