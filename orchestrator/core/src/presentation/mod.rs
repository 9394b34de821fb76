// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`clyde-orchestrator-core`)
//!
//! HTTP surface that translates external requests into orchestrator calls.
//! No orchestration logic lives here.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | `/gpt` chat endpoint, redirect and health |

pub mod api;
