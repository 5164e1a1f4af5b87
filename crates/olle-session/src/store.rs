// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use olle_config::SessionConfig;

/// One turn of conversation as stored in session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// In-memory conversation session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Total updates applied over the session's lifetime (monotonic; not
    /// capped by history trimming).
    pub message_count: u64,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            last_activity: now,
            created_at: now,
            message_count: 0,
        }
    }
}

/// Store-level statistics for the `/api/sessions` surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub total_messages: usize,
    pub max_history: usize,
    pub timeout_ms: i64,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub messages: usize,
    pub message_count: u64,
    pub age_ms: i64,
    pub idle_ms: i64,
}

/// Concurrent session store with TTL eviction.
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    max_history: usize,
    timeout_ms: i64,
    sweep_interval: Duration,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            max_history: config.max_history,
            timeout_ms: config.timeout_ms,
            sweep_interval: Duration::from_millis(config.sweep_interval_ms),
        }
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        (now - session.last_activity).num_milliseconds() > self.timeout_ms
    }

    /// Resolve the session for a request fingerprint, creating it if absent.
    ///
    /// Returns the session id and a snapshot of its history.  An expired
    /// session is removed on access and replaced by a fresh empty one under
    /// the same id — clients re-establish silently.
    pub fn get_or_assign(
        &self,
        user_agent: &str,
        model: &str,
        message_count: usize,
    ) -> (String, Vec<ChatMessage>) {
        let id = crate::session_id(user_agent, model, message_count);
        let now = Utc::now();

        let mut entry = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id.clone()));
        if self.is_expired(&entry, now) {
            debug!(session = %id, "session expired; starting fresh");
            *entry = Session::new(id.clone());
        }
        (id, entry.messages.clone())
    }

    /// History snapshot without creating the session.
    pub fn history(&self, id: &str) -> Option<Vec<ChatMessage>> {
        let now = Utc::now();
        {
            let session = self.sessions.get(id)?;
            if !self.is_expired(&session, now) {
                return Some(session.messages.clone());
            }
        }
        // Expired: the read guard is released above, so removal is safe.
        self.sessions.remove(id);
        None
    }

    /// Replace the session history, keeping only the newest
    /// `max_history` messages, and refresh the activity timestamp.
    pub fn update(&self, id: &str, messages: Vec<ChatMessage>) {
        let mut entry = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id.to_string()));

        let overflow = messages.len().saturating_sub(self.max_history);
        entry.messages = messages.into_iter().skip(overflow).collect();
        entry.last_activity = Utc::now();
        entry.message_count += 1;
    }

    /// Remove every expired session.  Returns how many were evicted.
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !self.is_expired(s, now));
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!(evicted, "session sweeper removed idle sessions");
        }
        evicted
    }

    pub fn stats(&self) -> SessionStats {
        let now = Utc::now();
        let mut sessions: Vec<SessionSummary> = self
            .sessions
            .iter()
            .filter(|s| !self.is_expired(s, now))
            .map(|s| SessionSummary {
                id: s.id.clone(),
                messages: s.messages.len(),
                message_count: s.message_count,
                age_ms: (now - s.created_at).num_milliseconds(),
                idle_ms: (now - s.last_activity).num_milliseconds(),
            })
            .collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));

        SessionStats {
            active_sessions: sessions.len(),
            total_messages: sessions.iter().map(|s| s.messages).sum(),
            max_history: self.max_history,
            timeout_ms: self.timeout_ms,
            sessions,
        }
    }

    /// Spawn the periodic eviction sweeper.  The task runs for the process
    /// lifetime; dropping the returned handle detaches it.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let period = store.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; skip it so a fresh
            // store isn't swept before it has seen a request.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.evict_expired();
            }
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(max_history: usize, timeout_ms: i64) -> SessionStore {
        SessionStore::new(&SessionConfig {
            max_history,
            timeout_ms,
            sweep_interval_ms: 300_000,
        })
    }

    fn msgs(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| ChatMessage::new("user", format!("m{i}")))
            .collect()
    }

    #[test]
    fn get_or_assign_is_idempotent() {
        let store = store_with(50, 60_000);
        let (a, _) = store.get_or_assign("curl/8.0", "llama3.1:8b", 0);
        let (b, _) = store.get_or_assign("curl/8.0", "llama3.1:8b", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn update_trims_to_tail() {
        let store = store_with(3, 60_000);
        let (id, _) = store.get_or_assign("ua", "m", 0);
        store.update(&id, msgs(5));
        let history = store.history(&id).unwrap();
        assert_eq!(history.len(), 3);
        // Oldest dropped FIFO: m2, m3, m4 remain.
        assert_eq!(history[0].content, "m2");
        assert_eq!(history[2].content, "m4");
    }

    #[test]
    fn update_at_exact_capacity_plus_one_drops_one_from_head() {
        let store = store_with(4, 60_000);
        let (id, _) = store.get_or_assign("ua", "m", 0);
        store.update(&id, msgs(5));
        let history = store.history(&id).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "m1");
    }

    #[test]
    fn update_increments_message_count_monotonically() {
        let store = store_with(2, 60_000);
        let (id, _) = store.get_or_assign("ua", "m", 0);
        store.update(&id, msgs(5));
        store.update(&id, msgs(5));
        let count = store.sessions.get(&id).unwrap().message_count;
        assert_eq!(count, 2);
    }

    #[test]
    fn expired_session_is_invisible_and_removed_on_access() {
        let store = store_with(50, 0);
        let (id, _) = store.get_or_assign("ua", "m", 0);
        store.update(&id, msgs(2));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(store.history(&id).is_none());
        assert!(store.sessions.get(&id).is_none());
    }

    #[test]
    fn expired_session_restarts_fresh_under_same_id() {
        let store = store_with(50, 0);
        let (id, _) = store.get_or_assign("ua", "m", 0);
        store.update(&id, msgs(2));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let (again, history) = store.get_or_assign("ua", "m", 0);
        assert_eq!(id, again);
        assert!(history.is_empty());
    }

    #[test]
    fn evict_expired_counts_removals() {
        let store = store_with(50, 0);
        store.get_or_assign("a", "m", 0);
        store.get_or_assign("b", "m", 0);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(store.evict_expired(), 2);
        assert_eq!(store.sessions.len(), 0);
    }

    #[test]
    fn live_sessions_survive_eviction() {
        let store = store_with(50, 60_000);
        let (id, _) = store.get_or_assign("ua", "m", 0);
        store.update(&id, msgs(1));
        assert_eq!(store.evict_expired(), 0);
        assert!(store.history(&id).is_some());
    }

    #[test]
    fn stats_reflect_live_sessions() {
        let store = store_with(50, 60_000);
        let (id, _) = store.get_or_assign("ua", "m", 0);
        store.update(&id, msgs(3));
        let stats = store.stats();
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.sessions[0].id, id);
        assert_eq!(stats.sessions[0].message_count, 1);
    }
}
