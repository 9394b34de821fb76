// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Clyde gateway core
//!
//! Per-user conversation windows, provider adapters, the retry/failover
//! orchestrator and its HTTP surface.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Everything the `clyde` binary wires together

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
