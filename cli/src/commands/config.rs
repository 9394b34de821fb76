// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use clyde_core::domain::gateway_config::GatewayConfigManifest;
use clyde_core::infrastructure::ProviderRegistry;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with the built-in defaults
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./clyde-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, force } => generate(output, force),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = GatewayConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. CLYDE_CONFIG_PATH: {}",
            std::env::var("CLYDE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./clyde-config.yaml");
        println!("  4. ~/.clyde/config.yaml");
        println!("  5. /etc/clyde/config.yaml");
        if let Some(found) = GatewayConfigManifest::discover_config() {
            println!("  Discovered: {}", found.display().to_string().green());
        }
        println!();
    }

    let spec = &config.spec;

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Server:".bold());
    println!("  Listen: {}:{}", spec.server.bind_address, spec.server.port);
    println!("  Redirect: {}", spec.server.redirect_url);
    println!();

    println!("{}", "Conversation:".bold());
    println!("  History: {}", if spec.conversation.enabled { "enabled" } else { "disabled" });
    println!("  Max entries per user: {}", spec.conversation.max_entries);
    match spec.conversation.max_users {
        Some(users) => println!("  Max users: {}", users),
        None => println!("  Max users: {}", "unbounded".yellow()),
    }
    println!();

    println!("{}", "Orchestration:".bold());
    println!("  Default mode: {}", spec.orchestration.default_mode);
    println!("  Rate limit policy: {:?}", spec.orchestration.rate_limit_policy);
    match spec.orchestration.max_attempts {
        Some(n) => println!("  Max attempts: {}", n),
        None => println!("  Max attempts: one pass over eligible providers"),
    }
    println!("  Request timeout: {}s", spec.orchestration.request_timeout_secs);
    println!();

    println!("{}", "Providers:".bold());
    for provider in &spec.providers {
        let status = if provider.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!("  {} ({}) [{}]", provider.name.bold(), provider.provider_type, status);
        if !provider.endpoint.is_empty() {
            println!("    Endpoint: {}", provider.endpoint);
        }
        if !provider.model.is_empty() {
            println!("    Model: {}", provider.model);
        }
        println!("    Modes: {}", provider.effective_modes().join(", "));
        println!("    Image input: {}", provider.supports_image);
        println!("    Normalization: {:?}", provider.normalization);
        if provider.api_key.is_some() {
            let resolved = ProviderRegistry::resolve_api_key(&provider.api_key).is_some();
            println!(
                "    API key: {}",
                if resolved { "set".green() } else { "missing".red() }
            );
        }
    }
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    GatewayConfigManifest::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
