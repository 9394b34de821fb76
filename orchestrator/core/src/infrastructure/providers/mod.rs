// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

// Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the `ProviderAdapter` domain interface and
// one backend's calling convention and failure signals.

pub mod gemini;
pub mod openai_compatible;
pub mod ollama;
pub mod tgpt;
pub mod registry;

pub use registry::ProviderRegistry;
