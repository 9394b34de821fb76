// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod conversation_store;
pub mod image_loader;
pub mod providers;

pub use conversation_store::{ConversationLease, ConversationStore};
pub use image_loader::HttpImageLoader;
pub use providers::ProviderRegistry;
