// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Conversation state, reply normalization, the provider contract and the
//! gateway request/result types.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and rules, no I/O

pub mod conversation;
pub mod normalizer;
pub mod provider;
pub mod image;
pub mod gateway;
pub mod gateway_config;
