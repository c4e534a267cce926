//! Config command - configuration management.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a config file with defaults
    Init {
        /// Project URL to put in [backend]
        #[arg(long)]
        url: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct PathOutput {
    path: Option<String>,
    exists: bool,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { url, force } => cmd_init(ctx, url, force),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    let mut config = loaded.config.clone();

    // Never echo the key itself
    if let Some(backend) = config.backend.as_mut()
        && backend.anon_key.is_some()
    {
        backend.anon_key = Some("********".to_string());
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("# Corps Configuration\n");
    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)\n");
    } else {
        for source in sources {
            println!("# Loaded: {}", source.display());
        }
        println!();
    }

    let mut effective = config.clone();
    effective.backend = Some(config.backend());
    effective.auth = Some(config.auth());
    effective.cache = Some(config.cache());
    effective.logging = Some(config.logging());
    print!("{}", effective.to_toml()?);

    for warning in &loaded.warnings {
        println!("\n# Warning: {}", warning);
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let path = ctx
        .loaded
        .config_dir
        .as_ref()
        .map(|dir| dir.join("config.toml"));
    let exists = path.as_ref().is_some_and(|p| p.is_file());

    if ctx.json_output {
        let output = PathOutput {
            path: path.as_ref().map(|p| p.display().to_string()),
            exists,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match path {
        Some(path) if exists => println!("{}", path.display()),
        Some(path) => println!("{} (not created yet)", path.display()),
        None => println!("Could not determine config directory"),
    }
    Ok(())
}

fn cmd_init(ctx: &Context, url: Option<String>, force: bool) -> Result<()> {
    let dir = ctx
        .loaded
        .config_dir
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    let path = dir.join("config.toml");

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let mut config = corps_config::CorpsConfig::new();
    config.backend = Some(corps_config::BackendConfig {
        url,
        ..Default::default()
    });
    config.auth = Some(Default::default());
    config.cache = Some(Default::default());
    corps_config::save_config(&config, &path)?;

    println!("Wrote {}", path.display());
    Ok(())
}
