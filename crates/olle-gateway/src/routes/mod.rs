// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod chat;
pub mod health;
pub mod proxy;
pub mod sessions;
pub mod tools;
pub mod unified;
pub mod workflows;

use axum::http::HeaderMap;

/// The client fingerprint half of session identity.
pub(crate) fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}
