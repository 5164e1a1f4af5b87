// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use axum::Json;
use serde_json::{json, Value};

/// Supported tool names with their parameter requirements.
pub async fn list() -> Json<Value> {
    Json(json!({ "tools": olle_tools::vocabulary() }))
}
