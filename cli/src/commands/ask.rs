// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `clyde ask`: run one prompt through the orchestrator without the HTTP layer.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use clyde_core::domain::gateway::{ChatRequest, GatewayResult};
use clyde_core::domain::gateway_config::GatewayConfigManifest;

use crate::runtime::build_orchestrator;

#[derive(Args, Debug)]
pub struct AskArgs {
    /// Prompt text
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// Provider mode (e.g. gemini, g4f, tgpt, local)
    #[arg(short = 't', long = "type")]
    pub mode: Option<String>,

    /// Image URL sent alongside the prompt
    #[arg(long)]
    pub image: Option<String>,

    /// Conversation id
    #[arg(long, default_value = "cli")]
    pub uid: String,

    /// Print the raw JSON result
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: AskArgs, config: GatewayConfigManifest) -> Result<()> {
    let orchestrator = build_orchestrator(&config.spec)?;

    let request = ChatRequest {
        user_id: args.uid,
        prompt: args.prompt,
        image_url: args.image,
        mode: args.mode,
    };

    let outcome = orchestrator.handle(request).await;
    let attribution = outcome
        .as_ref()
        .ok()
        .map(|r| (r.provider.clone(), r.attempts, r.errors.clone()));
    let result = GatewayResult::from(outcome);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        match &result {
            GatewayResult::Success { message, .. } => {
                println!("{}", message);
                if let Some((provider, attempts, skipped)) = attribution {
                    eprintln!("{}", format!("via {} after {} attempt(s)", provider, attempts).dimmed());
                    for diagnostic in skipped {
                        eprintln!("  {}", diagnostic.dimmed());
                    }
                }
            }
            GatewayResult::Failure { error, errors, .. } => {
                eprintln!("{}", error.red());
                for diagnostic in errors {
                    eprintln!("  {}", diagnostic.dimmed());
                }
            }
        }
    }

    if !result.is_success() {
        anyhow::bail!("Request failed with code {}", result.code() as u8);
    }

    Ok(())
}
