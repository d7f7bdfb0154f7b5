//! Schema provisioning command

use anyhow::{Context, Result};
use clap::Parser;

use fisufba_server::{provision, AppConfig, ProvisionReport};

/// Arguments for the provision command
#[derive(Parser, Debug)]
pub struct ProvisionArgs {
    /// Skip seeding the `[admin]` account even when configured
    #[arg(long)]
    pub no_admin: bool,

    /// Print the report as JSON (for scripts)
    #[arg(long)]
    pub json: bool,
}

/// Create missing tables and seed reference rows
pub async fn run_provision(args: ProvisionArgs, config: AppConfig) -> Result<()> {
    let admin = if args.no_admin {
        None
    } else {
        config.admin.as_ref()
    };
    if admin.is_none() {
        tracing::debug!("no admin account to seed");
    }

    let report = provision(&config.database, admin)
        .await
        .context("Provisioning failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ProvisionReport) {
    if report.is_noop() {
        println!("Database already provisioned, nothing to do.");
        return;
    }
    if !report.created_tables.is_empty() {
        println!("Created tables: {}", report.created_tables.join(", "));
    }
    let seeded = &report.seeded;
    println!(
        "Seeded {} groups, {} permissions, {} grants",
        seeded.groups, seeded.permissions, seeded.grants
    );
    if seeded.admin_created {
        println!("Created admin account.");
    }
}
