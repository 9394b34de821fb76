// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Conversation
//!
//! Rolling per-user transcript used to give stateless backends a sense of
//! dialogue. Entries are stored pre-formatted: a prompt is wrapped as
//! `User:\n<prompt>\nAssistant:` so that the rendered context ends on an open
//! assistant turn, and replies are stored verbatim.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** History window with FIFO eviction

use serde::Serialize;
use std::collections::VecDeque;

/// Default number of retained entries per user (50 prompt/reply exchanges).
pub const DEFAULT_HISTORY_CAP: usize = 100;

/// One turn of a conversation, already formatted for prompt rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConversationEntry(String);

impl ConversationEntry {
    /// Wrap a user prompt as an open assistant turn.
    pub fn prompt(text: &str) -> Self {
        Self(format!("User:\n{text}\nAssistant:"))
    }

    /// Store an assistant reply as-is.
    pub fn reply(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ordered, bounded sequence of entries for a single user.
///
/// Length never exceeds `cap`; on overflow the oldest entries are dropped
/// first and the survivors keep their relative order.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<ConversationEntry>,
    cap: usize,
}

impl ConversationHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            entries: VecDeque::with_capacity(cap.min(DEFAULT_HISTORY_CAP)),
            cap,
        }
    }

    /// Append an entry and apply the window. Returns how many entries were evicted.
    pub fn push(&mut self, entry: ConversationEntry) -> usize {
        self.entries.push_back(entry);
        let mut evicted = 0;
        while self.entries.len() > self.cap {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConversationEntry> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Render the system prompt followed by every retained entry, oldest first.
    ///
    /// The system prompt is glued directly to the first entry; entries are
    /// separated by a single newline.
    pub fn render(&self, system_prompt: &str) -> String {
        let body = self
            .entries
            .iter()
            .map(ConversationEntry::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        let mut context = String::with_capacity(system_prompt.len() + body.len());
        context.push_str(system_prompt);
        context.push_str(&body);
        context
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}
