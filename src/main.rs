// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use olle_gateway::AppState;
use olle_ollama::{Backend, OllamaClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = olle_config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let state = AppState::new(config);
            olle_gateway::serve(state).await
        }
        Commands::CheckBackend => check_backend(&config).await,
        Commands::PrintConfig => {
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn check_backend(config: &olle_config::Config) -> anyhow::Result<()> {
    let client = OllamaClient::new(&config.backend);
    let models = client.tags().await?;
    println!("backend: {}", config.backend.base_url);
    if models.is_empty() {
        println!("no models installed");
    } else {
        for m in &models {
            match m.size {
                Some(size) => println!("  {}  ({:.1} GB)", m.name, size as f64 / 1e9),
                None => println!("  {}", m.name),
            }
        }
    }
    Ok(())
}
