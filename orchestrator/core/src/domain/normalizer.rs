// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Response normalization
//!
//! Turns a raw backend reply into the message returned to the chat bot.
//! Two mutually exclusive modes exist and are chosen per provider:
//!
//! - [`NormalizationMode::Truncate`]: lower-case, cut at the first `user: `
//!   marker (the model kept writing the dialogue), then strip any
//!   self-identifying assistant prefix such as `clyde: `.
//! - [`NormalizationMode::LastLine`]: keep only the final line and turn every
//!   double space into a newline. Used for backends that restate the context
//!   and put the real answer on the last line.

use serde::{Deserialize, Serialize};

/// Dialogue marker a model emits when it starts writing the user's next turn.
/// Matched after lower-casing.
pub const USER_TURN_MARKER: &str = "user: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationMode {
    #[default]
    Truncate,
    LastLine,
}

/// Per-provider normalizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseNormalizer {
    mode: NormalizationMode,
    assistant_prefixes: Vec<String>,
}

impl ResponseNormalizer {
    pub fn new(mode: NormalizationMode, assistant_prefixes: Vec<String>) -> Self {
        let assistant_prefixes = assistant_prefixes
            .into_iter()
            .map(|p| p.to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            mode,
            assistant_prefixes,
        }
    }

    pub fn truncate(assistant_prefixes: Vec<String>) -> Self {
        Self::new(NormalizationMode::Truncate, assistant_prefixes)
    }

    pub fn last_line() -> Self {
        Self::new(NormalizationMode::LastLine, Vec::new())
    }

    pub fn mode(&self) -> NormalizationMode {
        self.mode
    }

    pub fn normalize(&self, raw: &str) -> String {
        match self.mode {
            NormalizationMode::Truncate => truncate_reply(raw, &self.assistant_prefixes),
            NormalizationMode::LastLine => last_line_reply(raw),
        }
    }
}

/// Lower-case, cut at the first user-turn marker, strip assistant prefixes.
///
/// `prefixes` must already be lower-case.
pub fn truncate_reply(raw: &str, prefixes: &[String]) -> String {
    let mut text = raw.to_lowercase();

    // Stripping can splice a new prefix ("clyclyde: de: ") or a new user-turn
    // marker ("usclyde: er: ") together, so repeat both until nothing changes.
    loop {
        let before = text.len();
        if let Some(idx) = text.find(USER_TURN_MARKER) {
            text.truncate(idx);
        }
        for prefix in prefixes {
            text = text.replace(prefix.as_str(), "");
        }
        if text.len() == before {
            break;
        }
    }

    text.trim().to_string()
}

/// Keep the last line only and expand double spaces into line breaks.
pub fn last_line_reply(raw: &str) -> String {
    raw.lines()
        .last()
        .unwrap_or_default()
        .replace("  ", "\n")
}
