// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod orchestrator;

// Re-export use cases for convenience
pub use orchestrator::{OrchestratorSettings, ProviderOrchestrator};
