// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Gateway assembly
//!
//! Builds the provider registry, conversation store, image loader and
//! orchestrator from a loaded manifest. Shared by `serve` and `ask`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use clyde_core::{
    application::orchestrator::{OrchestratorSettings, ProviderOrchestrator},
    domain::gateway_config::{GatewayConfigManifest, GatewayConfigSpec},
    infrastructure::{ConversationStore, HttpImageLoader, ProviderRegistry},
};

/// Load, override and validate the manifest.
pub fn load_config(config_path: Option<PathBuf>) -> Result<GatewayConfigManifest> {
    let config = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

pub fn build_orchestrator(spec: &GatewayConfigSpec) -> Result<Arc<ProviderOrchestrator>> {
    let registry = ProviderRegistry::from_config(spec).context("Failed to initialize providers")?;

    let images = Arc::new(HttpImageLoader::new(
        registry.http(),
        spec.orchestration.max_image_bytes,
        spec.orchestration.limits().timeout,
    ));

    let conversation = &spec.conversation;
    let store = Arc::new(ConversationStore::new(
        conversation.max_entries,
        conversation.max_users,
        conversation.system_prompt.clone(),
    ));

    info!(
        providers = ?registry.names(),
        history = conversation.enabled,
        max_entries = conversation.max_entries,
        policy = ?spec.orchestration.rate_limit_policy,
        "Gateway assembled"
    );

    Ok(Arc::new(ProviderOrchestrator::new(
        registry.into_specs(),
        store,
        images,
        OrchestratorSettings::from_config(spec),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_from_defaults() {
        let spec = GatewayConfigSpec::default();
        let orchestrator = build_orchestrator(&spec).unwrap();
        assert_eq!(orchestrator.providers().len(), 4);
        assert!(orchestrator.settings().history_enabled);
        assert_eq!(orchestrator.store().max_entries(), 100);
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clyde.yaml");
        std::fs::write(
            &path,
            r#"
apiVersion: clyde.chat/v1
kind: GatewayConfig
metadata:
  name: local-only
spec:
  orchestration:
    default_mode: local
  providers:
    - name: ollama
      type: ollama
      endpoint: http://127.0.0.1:11434
      model: llama3.2
      modes: [local]
"#,
        )
        .unwrap();

        let config = load_config(Some(path)).unwrap();
        assert_eq!(config.metadata.name, "local-only");
        assert_eq!(config.spec.providers.len(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clyde.yaml");
        std::fs::write(
            &path,
            "apiVersion: clyde.chat/v1\nkind: GatewayConfig\nmetadata:\n  name: x\nspec:\n  orchestration:\n    default_mode: nowhere\n",
        )
        .unwrap();

        assert!(load_config(Some(path)).is_err());
    }
}
