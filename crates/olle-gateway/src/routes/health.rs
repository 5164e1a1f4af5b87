// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "olle",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn version() -> Json<Value> {
    Json(json!({
        "service": "olle",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
