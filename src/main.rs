//! mdpress - self-hosted markdown blog and slide publisher.

mod api;
mod cli;
mod config;
mod init;
mod mirror;
mod publish;
mod repair;
mod serve;
mod store;
mod sync;
mod utils;
mod watch;

use anyhow::{Result, bail};
use clap::Parser;
use cli::{Cli, Commands};
use config::AppConfig;
use mirror::FileMirror;
use std::path::Path;
use store::ContentStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static AppConfig = Box::leak(Box::new(load_config(cli)?));

    match &cli.command {
        Commands::Init { name } => init::new_workspace(config.get_root(), name.is_some()),
        Commands::Serve { .. } => serve::serve(config).await,
        Commands::Repair => run_repair(config).await,
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &'static Cli) -> Result<AppConfig> {
    let base_root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let root = match &cli.command {
        Commands::Init { name: Some(name) } => base_root.join(name),
        _ => base_root.to_path_buf(),
    };
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() {
        AppConfig::from_path(&config_path)?
    } else {
        AppConfig::default()
    };

    // Validate config state based on command
    match (cli.is_init(), config_path.exists()) {
        (true, true) => {
            bail!("Config file already exists. Remove it manually or init in a different path.")
        }
        (false, false) => bail!("Config file not found."),
        _ => {}
    }

    config.anchor_at(&root, &cli.config);

    if let Commands::Serve { interface, port } = &cli.command {
        if let Some(interface) = interface {
            config.serve.interface = interface.clone();
        }
        if let Some(port) = port {
            config.serve.port = *port;
        }
    }

    if !cli.is_init() {
        config.validate()?;
    }

    Ok(config)
}

/// Run a one-shot reconciliation scan and print the findings.
async fn run_repair(config: &'static AppConfig) -> Result<()> {
    let store = ContentStore::connect(&config.database.path).await?;
    let mirror = FileMirror::new(config.content.root.clone());

    let report = repair::repair(&store, &mirror).await?;
    log!(
        "repair";
        "{} mirror file(s) rewritten, {} orphan file(s) found",
        report.rewritten.len(),
        report.orphans.len()
    );
    Ok(())
}
