// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use axum::{extract::State, Json};

use olle_session::SessionStats;

use crate::state::AppState;

pub async fn stats(State(state): State<AppState>) -> Json<SessionStats> {
    Json(state.sessions.stats())
}
