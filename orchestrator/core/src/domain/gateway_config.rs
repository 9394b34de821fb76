// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration schema for a Clyde gateway deployment:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - HTTP server settings
// - Conversation history window and persona prompt
// - Orchestration policy (rate-limit handling, attempt budget, per-call limits)
// - Ordered provider list (the deployment shape)
// - Logging and metrics settings

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::conversation::DEFAULT_HISTORY_CAP;
use super::normalizer::NormalizationMode;
use super::provider::GenerationLimits;

pub const API_VERSION: &str = "clyde.chat/v1";
pub const KIND: &str = "GatewayConfig";

/// Provider types the registry knows how to build.
pub const PROVIDER_TYPES: &[&str] = &["gemini", "openai-compatible", "ollama", "tgpt"];

/// Persona prompt prepended to every context.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are named Lunal and are currently chatting in a Discord server. \
You are friendly, warm, and farcical. \
You must always be extremely concise. \
If the user is chatting casually, \
your responses must be less than 1 sentence, \
sometimes just a word or two. \
If the user needs help, \
disregard the length restriction, \
answer technical or knowledge-based questions with useful details and reasoning. \
If insulted, respond with a similar insult. \
Communicate responses in lowercase without punctuation, \
similar to the style used in chat rooms. \
Use unicode emoji rarely. \
Do not refer to yourself as a bot, AI Assistant, or any equivalent term. \
Complete the Assistant reply, excluding prefixes.";

/// Top-level Kubernetes-style gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    /// API version (must be "clyde.chat/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: GatewayConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Gateway configuration specification (content under spec:)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigSpec {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Providers in attempt order
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Where `GET /` sends visitors
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Keep a rolling transcript per user id
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entries retained per user (a prompt and a reply are one entry each)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Least-recently-active idle users are forgotten beyond this count; users
    /// with a request in flight are kept even if that exceeds it.
    /// `null` keeps every user for the process lifetime.
    #[serde(default = "default_max_users")]
    pub max_users: Option<usize>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

/// What to do when an attempt reports a rate limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitPolicy {
    /// Stop the whole attempt loop; further attempts against a throttled
    /// shared upstream are wasted
    #[default]
    AbortLoop,
    /// Record the failure and move on to the next provider
    SkipProvider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Mode used when a request carries no `type`
    #[serde(default = "default_mode")]
    pub default_mode: String,

    #[serde(default)]
    pub rate_limit_policy: RateLimitPolicy,

    /// Total attempts per request, cycling over eligible providers.
    /// Unset means one pass over the eligible providers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Pause between attempts in milliseconds
    #[serde(default)]
    pub retry_delay_ms: u64,

    /// Per-call timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Largest accepted prompt image in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

impl OrchestrationConfig {
    pub fn limits(&self) -> GenerationLimits {
        GenerationLimits {
            max_output_tokens: self.max_output_tokens,
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name (e.g., "gemini", "g4f-bing")
    pub name: String,

    /// Provider type
    #[serde(rename = "type")]
    pub provider_type: String, // "gemini", "openai-compatible", "ollama", "tgpt"

    /// API endpoint URL (unused by "tgpt")
    #[serde(default)]
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier sent to the backend
    #[serde(default)]
    pub model: String,

    /// Request modes served; defaults to the provider name
    #[serde(default)]
    pub modes: Vec<String>,

    #[serde(default)]
    pub supports_image: bool,

    #[serde(default)]
    pub normalization: NormalizationMode,

    /// Self-identifying prefixes stripped in truncate mode (e.g. "clyde: ")
    #[serde(default)]
    pub assistant_prefixes: Vec<String>,

    /// Opening text of a quota wall returned as an otherwise successful reply
    #[serde(default)]
    pub quota_markers: Vec<String>,

    /// Upstream selector for aggregators (g4f `provider`, tgpt `--provider`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,

    /// Executable for CLI-backed providers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderConfig {
    /// Modes this provider serves, falling back to its name.
    pub fn effective_modes(&self) -> Vec<String> {
        if self.modes.is_empty() {
            vec![self.name.clone()]
        } else {
            self.modes.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus exposition
    #[serde(default)]
    pub enabled: bool,

    /// Metrics listener port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_redirect_url() -> String {
    "https://www.urbandictionary.com/ChatGPT".to_string()
}

fn default_max_entries() -> usize {
    DEFAULT_HISTORY_CAP
}

fn default_max_users() -> Option<usize> {
    Some(10_000)
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_mode() -> String {
    "gemini".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

/// Built-in deployment: Gemini with image support, a g4f aggregator, the
/// tgpt CLI and a local Ollama server.
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "gemini".to_string(),
            provider_type: "gemini".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: Some("env:GEMINI_API_KEY".to_string()),
            model: "gemini-1.5-flash-002".to_string(),
            modes: vec!["gemini".to_string()],
            supports_image: true,
            normalization: NormalizationMode::LastLine,
            assistant_prefixes: vec![],
            quota_markers: vec![],
            upstream: None,
            binary: None,
            enabled: true,
        },
        ProviderConfig {
            name: "g4f".to_string(),
            provider_type: "openai-compatible".to_string(),
            endpoint: "http://127.0.0.1:1337/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            modes: vec!["g4f".to_string()],
            supports_image: false,
            normalization: NormalizationMode::Truncate,
            assistant_prefixes: vec!["clyde: ".to_string(), "lunal: ".to_string()],
            quota_markers: vec![
                "you have reached your request limit".to_string(),
                "please complete the captcha".to_string(),
            ],
            upstream: None,
            binary: None,
            enabled: true,
        },
        ProviderConfig {
            name: "tgpt".to_string(),
            provider_type: "tgpt".to_string(),
            endpoint: String::new(),
            api_key: None,
            model: String::new(),
            modes: vec!["tgpt".to_string()],
            supports_image: false,
            normalization: NormalizationMode::Truncate,
            assistant_prefixes: vec!["clyde: ".to_string(), "lunal: ".to_string()],
            quota_markers: vec!["rate limit exceeded".to_string()],
            upstream: None,
            binary: Some("tgpt".to_string()),
            enabled: true,
        },
        ProviderConfig {
            name: "ollama".to_string(),
            provider_type: "ollama".to_string(),
            endpoint: "http://127.0.0.1:11434".to_string(),
            api_key: None,
            model: "llama3.2".to_string(),
            modes: vec!["local".to_string()],
            supports_image: false,
            normalization: NormalizationMode::Truncate,
            assistant_prefixes: vec!["clyde: ".to_string(), "lunal: ".to_string()],
            quota_markers: vec![],
            upstream: None,
            binary: None,
            enabled: true,
        },
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            redirect_url: default_redirect_url(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            max_users: default_max_users(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            rate_limit_policy: RateLimitPolicy::default(),
            max_attempts: None,
            retry_delay_ms: 0,
            request_timeout_secs: default_request_timeout(),
            max_output_tokens: default_max_output_tokens(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for GatewayConfigSpec {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            conversation: ConversationConfig::default(),
            orchestration: OrchestrationConfig::default(),
            providers: default_providers(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "clyde-gateway".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
            },
            spec: GatewayConfigSpec::default(),
        }
    }
}

impl GatewayConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CLYDE_CONFIG_PATH environment variable
    /// 2. ./clyde-config.yaml (working directory)
    /// 3. ~/.clyde/config.yaml (user home)
    /// 4. /etc/clyde/config.yaml (system, Unix) or C:\ProgramData\Clyde\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CLYDE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./clyde-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".clyde").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/clyde/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Clyde\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using built-in defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CLYDE_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: CLYDE_PORT={}", port);
                    self.spec.server.port = port;
                }
                Err(_) => tracing::warn!("Invalid value for CLYDE_PORT: '{}'. Ignoring.", val),
            }
        }

        if let Ok(val) = std::env::var("CLYDE_BIND_ADDRESS") {
            tracing::info!("Environment override: CLYDE_BIND_ADDRESS={}", val);
            self.spec.server.bind_address = val;
        }

        if let Ok(val) = std::env::var("CLYDE_HISTORY_ENABLED") {
            match parse_bool(&val) {
                Some(enabled) => {
                    tracing::info!("Environment override: CLYDE_HISTORY_ENABLED={}", enabled);
                    self.spec.conversation.enabled = enabled;
                }
                None => tracing::warn!(
                    "Invalid value for CLYDE_HISTORY_ENABLED: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("CLYDE_RATE_LIMIT_POLICY") {
            match serde_yaml::from_str::<RateLimitPolicy>(&val) {
                Ok(policy) => {
                    tracing::info!("Environment override: CLYDE_RATE_LIMIT_POLICY={:?}", policy);
                    self.spec.orchestration.rate_limit_policy = policy;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for CLYDE_RATE_LIMIT_POLICY: '{}'. Expected abort-loop/skip-provider. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;

        if spec.conversation.max_entries == 0 {
            anyhow::bail!("conversation.max_entries must be at least 1");
        }

        if spec.conversation.max_users == Some(0) {
            anyhow::bail!("conversation.max_users must be at least 1 (or null for unbounded)");
        }

        if spec.orchestration.max_attempts == Some(0) {
            anyhow::bail!("orchestration.max_attempts must be at least 1");
        }

        if spec.orchestration.request_timeout_secs == 0 {
            anyhow::bail!("orchestration.request_timeout_secs must be at least 1");
        }

        let mut seen = HashSet::new();
        for provider in &spec.providers {
            if provider.name.is_empty() {
                anyhow::bail!("Provider name cannot be empty");
            }

            if !seen.insert(provider.name.as_str()) {
                anyhow::bail!("Duplicate provider name: {}", provider.name);
            }

            if !PROVIDER_TYPES.contains(&provider.provider_type.as_str()) {
                anyhow::bail!(
                    "Unsupported provider type '{}' for: {}",
                    provider.provider_type,
                    provider.name
                );
            }

            if provider.provider_type != "tgpt" {
                if provider.endpoint.is_empty() {
                    anyhow::bail!("Provider endpoint cannot be empty for: {}", provider.name);
                }
                if provider.model.is_empty() {
                    anyhow::bail!("Provider model cannot be empty for: {}", provider.name);
                }
            }
        }

        let default_mode = &spec.orchestration.default_mode;
        let served = spec
            .providers
            .iter()
            .filter(|p| p.enabled)
            .any(|p| p.effective_modes().iter().any(|m| m.eq_ignore_ascii_case(default_mode)));
        if !served {
            anyhow::bail!(
                "Default mode '{}' is not served by any enabled provider",
                default_mode
            );
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
