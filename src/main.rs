// src/main.rs
use std::process::exit;
use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, Level};

use csvrunner::cli::{execute_command, Args};
use csvrunner::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .init();

    debug!("Starting csvrunner v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            exit(1);
        }
    };

    if let Err(e) = execute_command(&args.command, &config).await {
        error!("Command execution failed: {:#}", e);
        exit(1);
    }

    Ok(())
}
