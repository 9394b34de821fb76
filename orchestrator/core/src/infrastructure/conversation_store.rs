// Copyright (c) 2026 Clyde Gateway Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Conversation Store
//!
//! In-memory, per-user conversation windows.
//!
//! Each user id maps to its own `tokio::sync::Mutex<ConversationHistory>`, so
//! requests for different users never contend beyond a short map lookup, while
//! two in-flight requests for the same user queue behind each other. The
//! orchestrator holds a [`ConversationLease`] for the whole exchange (prompt
//! append, provider loop, reply append) which keeps a user's history in
//! request arrival order.
//!
//! The user map is an LRU: once `max_users` is reached the least recently
//! active idle user is forgotten. Users with a held or awaited lease are never
//! evicted, so the cap is exceeded while every tracked user is busy.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::domain::conversation::{ConversationEntry, ConversationHistory};

type SharedHistory = Arc<AsyncMutex<ConversationHistory>>;

pub struct ConversationStore {
    users: Mutex<LruCache<String, SharedHistory>>,
    max_users: Option<NonZeroUsize>,
    max_entries: usize,
    system_prompt: Arc<str>,
}

impl ConversationStore {
    /// `max_users = None` keeps every user for the lifetime of the process.
    pub fn new(max_entries: usize, max_users: Option<usize>, system_prompt: impl Into<String>) -> Self {
        Self {
            users: Mutex::new(LruCache::unbounded()),
            max_users: max_users.and_then(NonZeroUsize::new),
            max_entries,
            system_prompt: Arc::from(system_prompt.into()),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Number of users currently tracked.
    pub fn user_count(&self) -> usize {
        self.users.lock().len()
    }

    /// Fetch or lazily create the history handle for `user_id`, marking it
    /// most recently used.
    fn history_for(&self, user_id: &str) -> SharedHistory {
        let mut users = self.users.lock();
        if let Some(history) = users.get(user_id) {
            return history.clone();
        }

        let history = Arc::new(AsyncMutex::new(ConversationHistory::new(self.max_entries)));
        users.put(user_id.to_string(), history.clone());

        if let Some(cap) = self.max_users {
            while users.len() > cap.get() {
                // The map's own handle is the only one left when nobody holds a lease.
                let idle = users
                    .iter()
                    .rev()
                    .find(|(_, h)| Arc::strong_count(h) == 1)
                    .map(|(id, _)| id.clone());
                let Some(idle) = idle else {
                    debug!(tracked = users.len(), "Every tracked user is busy, exceeding max_users");
                    break;
                };
                users.pop(&idle);
                debug!(user_id = %idle, "Forgot least recently active conversation");
            }
        }

        history
    }

    /// Exclusive access to one user's history. Waits while another request
    /// for the same user holds its lease.
    pub async fn lease(&self, user_id: &str) -> ConversationLease {
        let guard = self.history_for(user_id).lock_owned().await;
        ConversationLease {
            user_id: user_id.to_string(),
            system_prompt: self.system_prompt.clone(),
            guard,
        }
    }

    pub async fn append_prompt(&self, user_id: &str, prompt: &str) {
        self.lease(user_id).await.append_prompt(prompt);
    }

    pub async fn append_reply(&self, user_id: &str, reply: &str) {
        self.lease(user_id).await.append_reply(reply);
    }

    pub async fn build_context(&self, user_id: &str) -> String {
        self.lease(user_id).await.build_context()
    }

    /// Read-only copy of a user's entries. Unknown users yield an empty list
    /// and are not created.
    pub async fn snapshot(&self, user_id: &str) -> Vec<ConversationEntry> {
        let history = self.users.lock().peek(user_id).cloned();
        match history {
            Some(history) => history.lock().await.snapshot(),
            None => Vec::new(),
        }
    }
}

/// Held for the duration of one exchange.
pub struct ConversationLease {
    user_id: String,
    system_prompt: Arc<str>,
    guard: OwnedMutexGuard<ConversationHistory>,
}

impl ConversationLease {
    pub fn append_prompt(&mut self, prompt: &str) {
        self.push(ConversationEntry::prompt(prompt));
    }

    pub fn append_reply(&mut self, reply: &str) {
        self.push(ConversationEntry::reply(reply));
    }

    fn push(&mut self, entry: ConversationEntry) {
        let evicted = self.guard.push(entry);
        if evicted > 0 {
            debug!(user_id = %self.user_id, evicted, "History window full, dropped oldest entries");
        }
    }

    /// System prompt followed by the retained history.
    pub fn build_context(&self) -> String {
        self.guard.render(&self.system_prompt)
    }
}
