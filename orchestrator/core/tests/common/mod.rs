// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clyde_core::application::orchestrator::{OrchestratorSettings, ProviderOrchestrator};
use clyde_core::domain::gateway_config::RateLimitPolicy;
use clyde_core::domain::image::{ImageLoadError, ImageLoader, ImagePayload};
use clyde_core::domain::normalizer::ResponseNormalizer;
use clyde_core::domain::provider::{
    AttemptOutcome, GenerationLimits, PromptContext, ProviderAdapter, ProviderSpec,
};
use clyde_core::infrastructure::conversation_store::ConversationStore;

pub const SYSTEM_PROMPT: &str = "SYS ";

/// Plays back a fixed list of outcomes, then keeps failing transiently.
pub struct ScriptedAdapter {
    name: String,
    outcomes: Mutex<VecDeque<AttemptOutcome>>,
    delay: Duration,
    calls: AtomicUsize,
    contexts: Mutex<Vec<PromptContext>>,
}

impl ScriptedAdapter {
    pub fn new(name: &str, outcomes: Vec<AttemptOutcome>) -> Arc<Self> {
        Self::with_delay(name, outcomes, Duration::ZERO)
    }

    pub fn with_delay(name: &str, outcomes: Vec<AttemptOutcome>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            outcomes: Mutex::new(outcomes.into()),
            delay,
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contexts(&self) -> Vec<PromptContext> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    async fn attempt(&self, context: &PromptContext) -> AttemptOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| AttemptOutcome::transient(&self.name, "script exhausted"))
    }
}

/// Serves a tiny PNG for any URL, or fails when built with `failing()`.
pub struct StaticImageLoader {
    fail: bool,
}

impl StaticImageLoader {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self { fail: false })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true })
    }
}

#[async_trait]
impl ImageLoader for StaticImageLoader {
    async fn load(&self, url: &str) -> Result<ImagePayload, ImageLoadError> {
        if self.fail {
            return Err(ImageLoadError::Status(404));
        }
        Ok(ImagePayload::new(url, "image/png", Bytes::from_static(b"png")))
    }
}

pub fn provider(name: &str, modes: &[&str], adapter: Arc<ScriptedAdapter>) -> ProviderSpec {
    ProviderSpec {
        name: name.to_string(),
        model: format!("{name}-model"),
        modes: modes.iter().map(|m| m.to_string()).collect(),
        supports_image: false,
        normalizer: ResponseNormalizer::truncate(vec!["clyde: ".to_string()]),
        adapter: adapter as Arc<dyn ProviderAdapter>,
    }
}

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        history_enabled: true,
        default_mode: "g4f".to_string(),
        rate_limit_policy: RateLimitPolicy::AbortLoop,
        max_attempts: None,
        retry_delay: Duration::ZERO,
        limits: GenerationLimits {
            max_output_tokens: 256,
            timeout: Duration::from_secs(5),
        },
    }
}

pub fn orchestrator(providers: Vec<ProviderSpec>, settings: OrchestratorSettings) -> ProviderOrchestrator {
    orchestrator_with_images(providers, settings, StaticImageLoader::ok())
}

pub fn orchestrator_with_images(
    providers: Vec<ProviderSpec>,
    settings: OrchestratorSettings,
    images: Arc<dyn ImageLoader>,
) -> ProviderOrchestrator {
    let store = Arc::new(ConversationStore::new(100, Some(100), SYSTEM_PROMPT));
    ProviderOrchestrator::new(providers, store, images, settings)
}
