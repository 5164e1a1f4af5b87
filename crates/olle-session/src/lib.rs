// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-client conversational sessions.
//!
//! Clients of the native API carry no session token, so identity is a
//! deterministic fingerprint: a 16-hex-character SHA-256 prefix over
//! `userAgent || model || messageCount`.  Two requests with the same
//! fingerprint land in the same session; a session that sits idle past the
//! configured TTL silently disappears and the next request starts fresh.
//!
//! All state is process-local.  The store is a [`DashMap`] so lookups and
//! updates from concurrent requests serialize per entry without a global
//! lock.

mod store;

pub use store::{ChatMessage, Session, SessionStats, SessionStore, SessionSummary};

use sha2::{Digest, Sha256};

/// Deterministic session id: first 16 hex chars of
/// `SHA-256(user_agent || model || message_count)`.
pub fn session_id(user_agent: &str, model: &str, message_count: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hasher.update(b"||");
    hasher.update(model.as_bytes());
    hasher.update(b"||");
    hasher.update(message_count.to_string().as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
