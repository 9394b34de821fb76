// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Clyde Gateway CLI
//!
//! The `clyde` binary serves the chat gateway and offers operator tooling.
//!
//! ## Commands
//!
//! - `clyde serve` - Run the HTTP gateway (default when no command is given)
//! - `clyde ask <PROMPT>` - Send one prompt through the provider loop
//! - `clyde config show|validate|generate` - Configuration management

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use clyde_gateway::commands::{self, AskArgs, ConfigCommand, ServeArgs};
use clyde_gateway::runtime::load_config;
use clyde_gateway::telemetry::{init_logging, with_bootstrap_logging};

/// Clyde Gateway - one endpoint in front of many flaky chat backends
#[derive(Parser)]
#[command(name = "clyde")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CLYDE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long, global = true, env = "CLYDE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Send a single prompt and print the reply
    #[command(name = "ask")]
    Ask(AskArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials such as GEMINI_API_KEY commonly live in a local .env file
    let dotenv = dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Config { command } => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::config::handle_command(command, cli.config).await
        }
        Commands::Serve(args) => {
            let bootstrap_level = cli.log_level.as_deref().unwrap_or("info");
            let config = with_bootstrap_logging(bootstrap_level, || load_config(cli.config))?;
            let logging = &config.spec.observability.logging;
            init_logging(cli.log_level.as_deref().unwrap_or(logging.level.as_str()), &logging.format)?;
            if let Some(path) = dotenv {
                info!("Loaded environment from {}", path.display());
            }
            commands::serve::run(args, config).await
        }
        Commands::Ask(args) => {
            let bootstrap_level = cli.log_level.as_deref().unwrap_or("warn");
            let config = with_bootstrap_logging(bootstrap_level, || load_config(cli.config))?;
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "text")?;
            commands::ask::run(args, config).await
        }
    }
}
