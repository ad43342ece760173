//! Schoolgate CLI - inspect and operate multi-tenant access control.
//!
//! Decisions, profiles and module lifecycle run against a directory snapshot
//! file; `catalog` and `snapshot` need no snapshot.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{catalog, check, module, profile, snapshot, Session};
use output::OutputFormat;
use schoolgate_core::config::Config;
use schoolgate_core::telemetry::init_logging;

/// Schoolgate - role-based access control for school tenants
#[derive(Parser)]
#[command(
    name = "schoolgate",
    author = "Aezi <aezi.zhu@icloud.com>",
    version = "0.1.0",
    about = "Schoolgate - multi-tenant access control",
    long_about = "Check permissions, build access profiles and enable or disable modules per school.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Directory snapshot file (.json or .toml)
    #[arg(long, global = true, env = "SCHOOLGATE_SNAPSHOT", default_value = "schoolgate.json")]
    snapshot: PathBuf,

    /// Configuration file
    #[arg(short, long, global = true, env = "SCHOOLGATE_CONFIG")]
    config: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether a user holds a permission
    Check(check::CheckArgs),

    /// Show everything a user can do
    Profile(profile::ProfileArgs),

    /// Enable, disable or inspect modules of a school
    #[command(subcommand)]
    Module(module::ModuleCommands),

    /// Inspect the permission catalog
    #[command(subcommand)]
    Catalog(catalog::CatalogCommands),

    /// Create snapshot files
    #[command(subcommand)]
    Snapshot(snapshot::SnapshotCommands),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    init_logging(&config.logging)?;

    let format = cli.output;
    match cli.command {
        Commands::Catalog(cmd) => catalog::execute(cmd, format).await,
        Commands::Snapshot(cmd) => snapshot::execute(cmd, format).await,
        Commands::Check(args) => {
            let session = Session::open(&cli.snapshot, &config)?;
            check::execute(args, &session, format).await
        }
        Commands::Profile(args) => {
            let session = Session::open(&cli.snapshot, &config)?;
            profile::execute(args, &session, format).await
        }
        Commands::Module(cmd) => {
            let session = Session::open(&cli.snapshot, &config)?;
            module::execute(cmd, &session, format).await
        }
    }
}
