//! Implicit session CLI
//!
//! Operator tool for the file-backed session store used by the implicit
//! login helpers:
//! 1. Resolves and loads the TOML configuration
//! 2. Opens the storage file under the configured namespace
//! 3. Runs one command (token, show, set, clear, logout) and prints the result

mod commands;
mod config;
mod error;

use std::sync::Arc;

use anyhow::{Context, Result};
use implicit_auth::{FileStorage, KeyedStore};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{Command, USAGE};
use crate::config::Config;

fn main() -> Result<()> {
    // JSON logs on stderr so command output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (cli_config_path, rest) = split_config_flag(&args)?;

    if rest.first().is_some_and(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    let command = Command::parse(&rest).with_context(|| format!("\n{USAGE}"))?;
    debug!(?command, "parsed command");

    let config_path = Config::resolve_path(cli_config_path);
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        storage_path = %config.storage.path.display(),
        namespace = %config.storage.namespace,
        "configuration loaded"
    );

    let storage = Arc::new(FileStorage::new(config.storage.path));
    let store = KeyedStore::with_namespace(storage, config.storage.namespace);

    let output = command.run(&store)?;
    println!("{output}");
    Ok(())
}

/// Pull `--config <path>` out of the argument list.
fn split_config_flag(args: &[String]) -> Result<(Option<&str>, Vec<String>)> {
    let mut config = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config requires a path")?;
            config = Some(path.as_str());
        } else {
            rest.push(arg.clone());
        }
    }
    Ok((config, rest))
}
