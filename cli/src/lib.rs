// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Clyde CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers and gateway assembly for the `clyde` binary

pub mod commands;
pub mod runtime;
pub mod telemetry;
