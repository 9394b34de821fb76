// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Gateway contract
//!
//! Request and result types exchanged between the HTTP layer and the
//! orchestrator. The JSON shape of [`GatewayResult`] is the public contract
//! consumed by the chat bot:
//!
//! - `{ "message": "...", "code": 0 }` on success
//! - `{ "error": "...", "errors": [...], "code": 1 }` on provider failure
//! - `{ "error": "...", "code": 2 }` when a required credential is missing

use serde::{Deserialize, Serialize};

use super::provider::ProviderFailure;

/// Friendly summary returned when every provider attempt failed.
pub const EXHAUSTED_MESSAGE: &str = "Couldn't get a reply from any provider. \
They may be rate limited, stuck behind a CAPTCHA, or broken right now. Try again in a bit.";

/// Friendly summary when no configured provider serves the request.
pub const UNSUPPORTED_MESSAGE: &str = "That chat mode isn't available right now. Try another one.";

/// Friendly summary when the attached image could not be fetched.
pub const IMAGE_UNAVAILABLE_MESSAGE: &str =
    "Couldn't open the attached image. Check the link and try again.";

/// Friendly summary when the gateway stopped before a reply was ready.
pub const CANCELLED_MESSAGE: &str = "The gateway stopped before a reply was ready. Try again in a bit.";

/// Result codes of the public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ResponseCode {
    Ok = 0,
    ProviderFailure = 1,
    SetupError = 2,
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for ResponseCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::ProviderFailure),
            2 => Ok(Self::SetupError),
            other => Err(format!("unknown response code {other}")),
        }
    }
}

/// A chat prompt from one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub user_id: String,
    pub prompt: String,
    pub image_url: Option<String>,
    /// Requested backend family; `None` uses the configured default mode
    pub mode: Option<String>,
}

impl ChatRequest {
    pub fn new(user_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            prompt: prompt.into(),
            image_url: None,
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

/// Normalized reply plus attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub message: String,
    pub provider: String,
    /// Number of adapter calls made, including the successful one
    pub attempts: usize,
    /// Diagnostics for attempts that failed before the success
    pub errors: Vec<String>,
}

/// Errors surfaced by an orchestration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("{provider} hasn't been set up: {reason}")]
    Setup { provider: String, reason: String },

    #[error("no provider serves mode '{mode}'{}", image_suffix(.with_image))]
    UnsupportedMode { mode: String, with_image: bool },

    #[error("all provider attempts failed")]
    Exhausted { errors: Vec<String> },

    #[error("provider failed fatally: {failure}")]
    Fatal {
        failure: ProviderFailure,
        errors: Vec<String>,
    },

    #[error("could not load image {url}: {reason}")]
    ImageUnavailable { url: String, reason: String },

    #[error("orchestration cancelled")]
    Cancelled,
}

fn image_suffix(with_image: &bool) -> &'static str {
    if *with_image {
        " with an image"
    } else {
        ""
    }
}

impl GatewayError {
    pub fn code(&self) -> ResponseCode {
        match self {
            Self::Setup { .. } => ResponseCode::SetupError,
            _ => ResponseCode::ProviderFailure,
        }
    }

    /// Human-readable summary shown to the chat bot. Never carries backend
    /// detail; that goes to [`GatewayError::diagnostics`].
    pub fn public_message(&self) -> String {
        match self {
            Self::Setup { provider, .. } => format!("{provider} hasn't been set up."),
            Self::Exhausted { .. } | Self::Fatal { .. } => EXHAUSTED_MESSAGE.to_string(),
            Self::UnsupportedMode { .. } => UNSUPPORTED_MESSAGE.to_string(),
            Self::ImageUnavailable { .. } => IMAGE_UNAVAILABLE_MESSAGE.to_string(),
            Self::Cancelled => CANCELLED_MESSAGE.to_string(),
        }
    }

    /// Per-attempt diagnostics for operators.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            Self::Exhausted { errors } | Self::Fatal { errors, .. } => errors.clone(),
            Self::Setup { reason, .. } => vec![reason.clone()],
            Self::UnsupportedMode { .. } => vec![format!("UnsupportedMode: {self}")],
            Self::ImageUnavailable { .. } => vec![self.to_string()],
            Self::Cancelled => vec![format!("Cancelled: {self}")],
        }
    }
}

/// Value serialized back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GatewayResult {
    Success {
        message: String,
        code: ResponseCode,
    },
    Failure {
        error: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
        code: ResponseCode,
    },
}

impl GatewayResult {
    pub fn code(&self) -> ResponseCode {
        match self {
            Self::Success { code, .. } | Self::Failure { code, .. } => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Result<ChatReply, GatewayError>> for GatewayResult {
    fn from(result: Result<ChatReply, GatewayError>) -> Self {
        match result {
            Ok(reply) => Self::Success {
                message: reply.message,
                code: ResponseCode::Ok,
            },
            Err(err) => Self::Failure {
                error: err.public_message(),
                errors: err.diagnostics(),
                code: err.code(),
            },
        }
    }
}
