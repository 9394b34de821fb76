// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

// tgpt Provider Adapter
//
// Runs the `tgpt` command-line client once per attempt. The child is spawned
// with `kill_on_drop`, so when the orchestrator's timeout or cancellation
// drops the attempt future the process goes with it.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::domain::provider::{classify_reply, AttemptOutcome, PromptContext, ProviderAdapter};

const RATE_LIMIT_HINTS: [&str; 3] = ["429", "rate limit", "too many requests"];

pub struct TgptAdapter {
    name: String,
    binary: String,
    upstream: Option<String>,
    model: Option<String>,
    quota_markers: Vec<String>,
}

impl TgptAdapter {
    pub fn new(
        name: String,
        binary: String,
        upstream: Option<String>,
        model: Option<String>,
        quota_markers: Vec<String>,
    ) -> Self {
        Self {
            name,
            binary,
            upstream,
            model: model.filter(|m| !m.is_empty()),
            quota_markers,
        }
    }

    fn command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--quiet");
        if let Some(provider) = &self.upstream {
            cmd.arg("--provider").arg(provider);
        }
        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }
        cmd.arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ProviderAdapter for TgptAdapter {
    async fn attempt(&self, context: &PromptContext) -> AttemptOutcome {
        let output = match self.command(&context.text).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return AttemptOutcome::setup(
                    &self.name,
                    format!("'{}' is not installed or not on PATH", self.binary),
                )
            }
            Err(e) => return AttemptOutcome::transient(&self.name, format!("failed to run {}: {}", self.binary, e)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() }
            );
            let lowered = detail.to_lowercase();
            return if RATE_LIMIT_HINTS.iter().any(|h| lowered.contains(h)) {
                AttemptOutcome::rate_limited(&self.name, detail)
            } else {
                AttemptOutcome::transient(&self.name, detail)
            };
        }

        classify_reply(&self.name, stdout, &self.quota_markers)
    }
}
