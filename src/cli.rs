// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// An intelligent gateway for local Ollama models.
///
/// Sits in front of an Ollama daemon, speaks its native API, and upgrades
/// each request: task classification, automatic model selection, workspace
/// context, per-client sessions, and AI-planned tool workflows.
#[derive(Parser, Debug)]
#[command(name = "olle", version, about)]
pub struct Cli {
    /// Path to an explicit config file (merged over the discovered layers).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging to stderr (same as RUST_LOG=debug).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the gateway (the default when no subcommand is given).
    ///
    /// Listens on PORT (default 3003) and proxies to OLLAMA_BASE_URL
    /// (default http://localhost:11434).
    Serve,

    /// Ping the backend and print its model inventory.
    ///
    /// Useful as a deployment smoke test:
    ///   olle check-backend && echo backend ok
    CheckBackend,

    /// Print the effective configuration after file layering and
    /// environment overrides, then exit.
    PrintConfig,
}
