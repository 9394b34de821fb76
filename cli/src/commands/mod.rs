// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Clyde CLI

pub mod ask;
pub mod config;
pub mod serve;

pub use self::ask::AskArgs;
pub use self::config::ConfigCommand;
pub use self::serve::ServeArgs;
