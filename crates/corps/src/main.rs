//! Corps - cadet corps portal shell
//!
//! Main entry point for the corps CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, login, logout, status, whoami};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Corps - cadet corps portal shell
#[derive(Parser)]
#[command(name = "corps")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config directory (default: platform config dir)
    #[arg(long, global = true, env = "CORPS_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login(login::LoginArgs),

    /// Sign out and forget the stored session
    Logout(logout::LogoutArgs),

    /// Show the signed-in user
    Whoami(whoami::WhoamiArgs),

    /// Show session, backend, and cache status
    Status(status::StatusArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = corps_config::load_config_with_options(None, cli.config_dir.as_deref())?;
    let logging = loaded.config.logging();

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "corps=debug,corps_auth=debug,corps_cache=debug,corps_config=debug,info"
    } else {
        "corps=info,corps_auth=warn,corps_cache=warn,warn"
    };

    let log_dir = logging.dir.clone().unwrap_or_else(|| {
        loaded
            .config_dir
            .as_ref()
            .map(|d| d.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"))
    });
    let (file_writer, _guard) = if logging.file_enabled {
        let file_appender = tracing_appender::rolling::daily(&log_dir, "corps.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        (Some(non_blocking), Some(guard))
    } else {
        (None, None)
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "corps=trace,corps_auth=trace,corps_cache=trace,corps_config=trace,info",
                ))
        }))
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    // Create context for commands
    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        loaded,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Login(args) => login::run(args, &ctx).await,
        Commands::Logout(args) => logout::run(args, &ctx).await,
        Commands::Whoami(args) => whoami::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
