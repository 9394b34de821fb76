// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Provider Orchestrator
//!
//! Turns one chat request into one normalized reply, or an aggregated failure.
//!
//! ```text
//! Idle -> TryingProvider(i) -> Success
//!                           -> NextProvider -> TryingProvider(i + 1)
//!                           -> ExhaustedProviders
//! ```
//!
//! Eligible providers are those serving the requested mode (and accepting an
//! image, when one is attached), in configured order. The loop cycles over
//! them until the attempt budget is spent. Per attempt:
//!
//! - success: normalize, record the reply in history, return
//! - rate limited: stop the loop under [`RateLimitPolicy::AbortLoop`],
//!   otherwise move on
//! - any other retryable failure, or an empty reply: move on
//! - any other fatal failure: surface it
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Retry/failover state machine over provider adapters

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::gateway::{ChatReply, ChatRequest, GatewayError};
use crate::domain::gateway_config::{GatewayConfigSpec, RateLimitPolicy};
use crate::domain::image::{ImageLoader, ImagePayload};
use crate::domain::provider::{
    AttemptOutcome, FailureKind, GenerationLimits, PromptContext, ProviderFailure, ProviderSpec,
};
use crate::infrastructure::conversation_store::{ConversationLease, ConversationStore};

/// Deployment policy for the attempt loop.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Keep per-user history and send it as context
    pub history_enabled: bool,
    /// Mode used when a request names none
    pub default_mode: String,
    pub rate_limit_policy: RateLimitPolicy,
    /// Total attempts per request; `None` is one pass over the eligible providers
    pub max_attempts: Option<u32>,
    /// Pause between consecutive attempts
    pub retry_delay: Duration,
    pub limits: GenerationLimits,
}

impl OrchestratorSettings {
    pub fn from_config(spec: &GatewayConfigSpec) -> Self {
        Self {
            history_enabled: spec.conversation.enabled,
            default_mode: spec.orchestration.default_mode.clone(),
            rate_limit_policy: spec.orchestration.rate_limit_policy,
            max_attempts: spec.orchestration.max_attempts,
            retry_delay: Duration::from_millis(spec.orchestration.retry_delay_ms),
            limits: spec.orchestration.limits(),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&GatewayConfigSpec::default())
    }
}

pub struct ProviderOrchestrator {
    providers: Vec<ProviderSpec>,
    store: Arc<ConversationStore>,
    images: Arc<dyn ImageLoader>,
    settings: OrchestratorSettings,
}

impl ProviderOrchestrator {
    pub fn new(
        providers: Vec<ProviderSpec>,
        store: Arc<ConversationStore>,
        images: Arc<dyn ImageLoader>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            providers,
            store,
            images,
            settings,
        }
    }

    pub fn providers(&self) -> &[ProviderSpec] {
        &self.providers
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, GatewayError> {
        self.handle_with_cancellation(request, CancellationToken::new()).await
    }

    /// Run one orchestration. Cancelling `cancel` abandons the in-flight
    /// attempt; nothing further is recorded and [`GatewayError::Cancelled`]
    /// is returned.
    pub async fn handle_with_cancellation(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatReply, GatewayError> {
        let mode = request
            .mode
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.settings.default_mode.as_str())
            .to_string();

        let span = info_span!(
            "orchestrate",
            request_id = %Uuid::new_v4(),
            user_id = %request.user_id,
            mode = %mode
        );

        self.run(request, mode, cancel).instrument(span).await
    }

    async fn run(
        &self,
        request: ChatRequest,
        mode: String,
        cancel: CancellationToken,
    ) -> Result<ChatReply, GatewayError> {
        let with_image = request.image_url.is_some();
        let eligible: Vec<&ProviderSpec> = self
            .providers
            .iter()
            .filter(|p| p.serves(&mode, with_image))
            .collect();

        if eligible.is_empty() {
            warn!(with_image, "No provider serves the requested mode");
            return Err(GatewayError::UnsupportedMode { mode, with_image });
        }

        let image = match request.image_url.as_deref() {
            Some(url) => Some(self.load_image(url, &cancel).await?),
            None => None,
        };

        let mut lease = if self.settings.history_enabled {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                lease = self.store.lease(&request.user_id) => Some(lease),
            }
        } else {
            None
        };

        let text = match lease.as_mut() {
            Some(lease) => {
                lease.append_prompt(&request.prompt);
                lease.build_context()
            }
            None => self.single_turn_text(&request.prompt),
        };

        let mut context = PromptContext::new(self.store.system_prompt(), text)
            .with_limits(self.settings.limits);
        if let Some(image) = image {
            context = context.with_image(image);
        }

        self.attempt_loop(&eligible, &context, lease.as_mut(), &cancel).await
    }

    fn single_turn_text(&self, prompt: &str) -> String {
        let system_prompt = self.store.system_prompt();
        if system_prompt.is_empty() {
            prompt.to_string()
        } else {
            format!("{}\n{}", system_prompt, prompt)
        }
    }

    async fn load_image(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<ImagePayload>, GatewayError> {
        let loaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            loaded = self.images.load(url) => loaded,
        };

        loaded.map(Arc::new).map_err(|e| {
            warn!(url, "Failed to load prompt image: {}", e);
            GatewayError::ImageUnavailable {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })
    }

    async fn attempt_loop(
        &self,
        eligible: &[&ProviderSpec],
        context: &PromptContext,
        mut lease: Option<&mut ConversationLease>,
        cancel: &CancellationToken,
    ) -> Result<ChatReply, GatewayError> {
        let budget = self
            .settings
            .max_attempts
            .map(|n| n as usize)
            .unwrap_or(eligible.len());
        let mut errors: Vec<String> = Vec::new();

        for attempt in 0..budget {
            let spec = eligible[attempt % eligible.len()];

            if attempt > 0 && !self.settings.retry_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                    _ = tokio::time::sleep(self.settings.retry_delay) => {}
                }
            }

            debug!(provider = %spec.name, attempt = attempt + 1, budget, "Trying provider");

            let started = Instant::now();
            let timeout = context.limits.timeout;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(provider = %spec.name, "Orchestration cancelled, abandoning attempt");
                    return Err(GatewayError::Cancelled);
                }
                result = tokio::time::timeout(timeout, spec.adapter.attempt(context)) => {
                    result.unwrap_or_else(|_| AttemptOutcome::timed_out(&spec.name, timeout))
                }
            };
            record_attempt(spec, &outcome, started.elapsed());

            match outcome {
                AttemptOutcome::Success(raw) => {
                    let message = spec.normalizer.normalize(&raw);
                    if message.trim().is_empty() {
                        let failure = ProviderFailure::new(
                            &spec.name,
                            FailureKind::EmptyReply,
                            "reply was blank after normalization",
                        );
                        warn!(provider = %spec.name, kind = %failure.kind, "Attempt failed: {}", failure.message);
                        errors.push(failure.to_string());
                        continue;
                    }

                    if let Some(lease) = lease.as_deref_mut() {
                        lease.append_reply(&message);
                    }

                    info!(provider = %spec.name, attempts = attempt + 1, "Reply ready");
                    return Ok(ChatReply {
                        message,
                        provider: spec.name.clone(),
                        attempts: attempt + 1,
                        errors,
                    });
                }
                AttemptOutcome::RetryableFailure(failure) => {
                    warn!(provider = %spec.name, attempt = attempt + 1, kind = %failure.kind, "Attempt failed: {}", failure.message);
                    let abort = failure.kind == FailureKind::RateLimited
                        && self.settings.rate_limit_policy == RateLimitPolicy::AbortLoop;
                    errors.push(failure.to_string());
                    if abort {
                        warn!(provider = %spec.name, "Rate limited, abandoning remaining attempts");
                        break;
                    }
                }
                AttemptOutcome::FatalFailure(failure) => {
                    warn!(provider = %spec.name, attempt = attempt + 1, kind = %failure.kind, "Attempt failed: {}", failure.message);
                    errors.push(failure.to_string());
                    match failure.kind {
                        FailureKind::EmptyReply => continue,
                        FailureKind::Setup => {
                            return Err(GatewayError::Setup {
                                provider: failure.provider,
                                reason: failure.message,
                            })
                        }
                        _ => return Err(GatewayError::Fatal { failure, errors }),
                    }
                }
            }
        }

        Err(GatewayError::Exhausted { errors })
    }
}

fn record_attempt(spec: &ProviderSpec, outcome: &AttemptOutcome, elapsed: Duration) {
    metrics::counter!(
        "clyde_provider_attempts_total",
        "provider" => spec.name.clone(),
        "outcome" => outcome.metric_label()
    )
    .increment(1);
    metrics::histogram!("clyde_provider_latency_seconds", "provider" => spec.name.clone())
        .record(elapsed.as_secs_f64());
}
