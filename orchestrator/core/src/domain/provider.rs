// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Provider Domain Interface (Anti-Corruption Layer)
//!
//! Every backend, whether a key-authenticated model API, a free community
//! aggregator, a local CLI or a local model server, is reduced to one
//! capability: take a [`PromptContext`] and produce an [`AttemptOutcome`].
//! Adapters translate their backend's failure signals (HTTP status, quota
//! strings embedded in a 200 body, blank text) into the outcome taxonomy once,
//! at the boundary, so the orchestrator never sees vendor-specific errors.
//!
//! Concrete adapters live in `infrastructure/providers/`.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::image::ImagePayload;
use super::normalizer::ResponseNormalizer;

/// Per-call limits handed to every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationLimits {
    /// Maximum tokens the backend may generate
    pub max_output_tokens: u32,

    /// Wall-clock budget for one attempt, enforced by the orchestrator
    pub timeout: Duration,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            max_output_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Everything an adapter needs for one call.
#[derive(Debug, Clone)]
pub struct PromptContext {
    /// Persona prompt, for backends that accept a separate system instruction
    pub system_prompt: String,

    /// Combined system prompt and user prompt (or full rendered history)
    pub text: String,

    /// Optional image sent alongside the text
    pub image: Option<Arc<ImagePayload>>,

    pub limits: GenerationLimits,
}

impl PromptContext {
    pub fn new(system_prompt: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            text: text.into(),
            image: None,
            limits: GenerationLimits::default(),
        }
    }

    pub fn with_image(mut self, image: Arc<ImagePayload>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_limits(mut self, limits: GenerationLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Failure taxonomy shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// Missing or rejected credential, or a missing local binary
    Setup,
    /// Call shaped for something the backend does not offer (unknown model/provider)
    UnsupportedMode,
    /// HTTP 429 or an equivalent throttling signal
    RateLimited,
    /// Network error, 5xx, unparseable body, unexpected exception
    Transient,
    /// Reply text present but blank
    EmptyReply,
    /// Quota marker embedded in an otherwise successful reply
    QuotaExhausted,
    /// No reply within the per-call timeout
    Timeout,
}

impl FailureKind {
    /// Label used in the `errors` diagnostics array.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Setup => "SetupError",
            Self::UnsupportedMode => "UnsupportedMode",
            Self::RateLimited => "RateLimited",
            Self::Transient | Self::Timeout => "TransientProviderError",
            Self::EmptyReply => "EmptyReply",
            Self::QuotaExhausted => "UpstreamQuotaExhausted",
        }
    }

    /// Short label for metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::UnsupportedMode => "unsupported_mode",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::EmptyReply => "empty_reply",
            Self::QuotaExhausted => "quota_exhausted",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One failed attempt, attributed to a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} ({provider}): {message}")]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: FailureKind,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(provider: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Tagged result of one provider call. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(String),
    RetryableFailure(ProviderFailure),
    FatalFailure(ProviderFailure),
}

impl AttemptOutcome {
    pub fn rate_limited(provider: &str, message: impl Into<String>) -> Self {
        Self::RetryableFailure(ProviderFailure::new(provider, FailureKind::RateLimited, message))
    }

    pub fn transient(provider: &str, message: impl Into<String>) -> Self {
        Self::RetryableFailure(ProviderFailure::new(provider, FailureKind::Transient, message))
    }

    pub fn quota_exhausted(provider: &str, message: impl Into<String>) -> Self {
        Self::RetryableFailure(ProviderFailure::new(provider, FailureKind::QuotaExhausted, message))
    }

    pub fn timed_out(provider: &str, timeout: Duration) -> Self {
        Self::RetryableFailure(ProviderFailure::new(
            provider,
            FailureKind::Timeout,
            format!("no reply within {}s", timeout.as_secs_f32()),
        ))
    }

    pub fn empty_reply(provider: &str) -> Self {
        Self::FatalFailure(ProviderFailure::new(
            provider,
            FailureKind::EmptyReply,
            "backend returned a blank reply",
        ))
    }

    pub fn setup(provider: &str, message: impl Into<String>) -> Self {
        Self::FatalFailure(ProviderFailure::new(provider, FailureKind::Setup, message))
    }

    pub fn unsupported(provider: &str, message: impl Into<String>) -> Self {
        Self::FatalFailure(ProviderFailure::new(provider, FailureKind::UnsupportedMode, message))
    }

    pub fn failure(&self) -> Option<&ProviderFailure> {
        match self {
            Self::Success(_) => None,
            Self::RetryableFailure(f) | Self::FatalFailure(f) => Some(f),
        }
    }

    pub fn metric_label(&self) -> &'static str {
        match self.failure() {
            None => "success",
            Some(f) => f.kind.metric_label(),
        }
    }
}

/// Classify a reply body that arrived over a successful transport.
///
/// Blank text is an [`FailureKind::EmptyReply`]. Text that is a quota wall is
/// [`FailureKind::QuotaExhausted`]: it opens with one of the backend's quota
/// markers, or a marker makes up at least half of it (case-insensitive).
/// Anything else is a success, including answers that merely mention a
/// marker phrase.
pub fn classify_reply(provider: &str, text: String, quota_markers: &[String]) -> AttemptOutcome {
    if text.trim().is_empty() {
        return AttemptOutcome::empty_reply(provider);
    }

    let lowered = text.trim().to_lowercase();
    if let Some(marker) = quota_markers
        .iter()
        .filter(|m| !m.trim().is_empty())
        .find(|m| is_quota_wall(&lowered, &m.trim().to_lowercase()))
    {
        return AttemptOutcome::quota_exhausted(
            provider,
            format!("reply contained quota marker '{marker}'"),
        );
    }

    AttemptOutcome::Success(text)
}

fn is_quota_wall(reply: &str, marker: &str) -> bool {
    if reply.starts_with(marker) {
        return true;
    }
    reply.contains(marker) && marker.chars().count() * 2 >= reply.chars().count()
}

/// Domain interface for generation backends.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Perform one generation call. Must not panic; every failure is an outcome.
    async fn attempt(&self, context: &PromptContext) -> AttemptOutcome;
}

/// Static description of a configured backend plus the adapter that calls it.
#[derive(Clone)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
    /// Request modes (`type` field) this provider serves
    pub modes: Vec<String>,
    pub supports_image: bool,
    pub normalizer: ResponseNormalizer,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl ProviderSpec {
    /// Whether this provider may serve a request of `mode`, with or without an image.
    pub fn serves(&self, mode: &str, with_image: bool) -> bool {
        self.modes.iter().any(|m| m.eq_ignore_ascii_case(mode)) && (!with_image || self.supports_image)
    }
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("modes", &self.modes)
            .field("supports_image", &self.supports_image)
            .field("normalizer", &self.normalizer)
            .finish_non_exhaustive()
    }
}
