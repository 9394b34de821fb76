// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

// Provider Registry - Adapter Construction
//
// Turns the ordered `providers` list of a gateway manifest into immutable
// `ProviderSpec`s. Order is preserved; it is the attempt order. Disabled
// entries are skipped, and entries that fail to build are logged and skipped
// so one broken backend does not take the gateway down.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::gateway_config::{GatewayConfigSpec, ProviderConfig};
use crate::domain::normalizer::ResponseNormalizer;
use crate::domain::provider::{ProviderAdapter, ProviderSpec};

use super::gemini::GeminiAdapter;
use super::ollama::OllamaAdapter;
use super::openai_compatible::OpenAICompatibleAdapter;
use super::tgpt::TgptAdapter;

const USER_AGENT: &str = concat!("clyde-gateway/", env!("CARGO_PKG_VERSION"));

/// Ordered set of configured providers
pub struct ProviderRegistry {
    specs: Vec<ProviderSpec>,
    client: reqwest::Client,
}

impl ProviderRegistry {
    /// Create provider registry from gateway configuration
    pub fn from_config(config: &GatewayConfigSpec) -> anyhow::Result<Self> {
        let client = Self::http_client()?;
        let mut specs = Vec::new();

        info!("Initializing provider registry");

        for provider_config in &config.providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            match Self::create_adapter(provider_config, &client) {
                Ok(adapter) => {
                    let modes = provider_config.effective_modes();
                    info!(
                        "Registered provider '{}' ({}) for modes {:?}",
                        provider_config.name, provider_config.provider_type, modes
                    );
                    specs.push(ProviderSpec {
                        name: provider_config.name.clone(),
                        model: provider_config.model.clone(),
                        modes,
                        supports_image: provider_config.supports_image,
                        normalizer: ResponseNormalizer::new(
                            provider_config.normalization,
                            provider_config.assistant_prefixes.clone(),
                        ),
                        adapter,
                    });
                }
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", provider_config.name, e);
                }
            }
        }

        if specs.is_empty() {
            warn!("No providers available - every request will fail with UnsupportedMode");
        }

        Ok(Self { specs, client })
    }

    fn http_client() -> anyhow::Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(client)
    }

    /// Create an adapter instance from configuration
    fn create_adapter(
        config: &ProviderConfig,
        client: &reqwest::Client,
    ) -> anyhow::Result<Arc<dyn ProviderAdapter>> {
        let api_key = Self::resolve_api_key(&config.api_key);

        let adapter: Arc<dyn ProviderAdapter> = match config.provider_type.as_str() {
            "gemini" => {
                if api_key.is_none() {
                    // Still registered: requests surface a setup error instead of UnsupportedMode.
                    warn!("Provider '{}' has no API key; requests will fail with a setup error", config.name);
                }
                Arc::new(GeminiAdapter::new(
                    config.name.clone(),
                    client.clone(),
                    config.endpoint.clone(),
                    api_key,
                    config.model.clone(),
                    config.quota_markers.clone(),
                ))
            }
            "openai-compatible" => Arc::new(OpenAICompatibleAdapter::new(
                config.name.clone(),
                client.clone(),
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
                config.upstream.clone(),
                config.quota_markers.clone(),
            )),
            "ollama" => Arc::new(OllamaAdapter::new(
                config.name.clone(),
                client.clone(),
                config.endpoint.clone(),
                config.model.clone(),
            )),
            "tgpt" => Arc::new(TgptAdapter::new(
                config.name.clone(),
                config.binary.clone().unwrap_or_else(|| "tgpt".to_string()),
                config.upstream.clone(),
                Some(config.model.clone()),
                config.quota_markers.clone(),
            )),
            _ => anyhow::bail!("Unsupported provider type: {}", config.provider_type),
        };

        Ok(adapter)
    }

    /// Resolve API key from config (supports "env:VAR_NAME" syntax).
    /// Unset or empty values resolve to `None`.
    pub fn resolve_api_key(key: &Option<String>) -> Option<String> {
        let resolved = match key.as_deref() {
            Some(k) => match k.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name).ok(),
                None => Some(k.to_string()),
            },
            None => None,
        };
        resolved.filter(|k| !k.trim().is_empty())
    }

    pub fn specs(&self) -> &[ProviderSpec] {
        &self.specs
    }

    pub fn into_specs(self) -> Vec<ProviderSpec> {
        self.specs
    }

    /// Shared HTTP client, reused by the image loader
    pub fn http(&self) -> reqwest::Client {
        self.client.clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }
}
