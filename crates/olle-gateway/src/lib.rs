// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTTP surface of the gateway.
//!
//! Routes mirror the daemon's native API (`/api/chat`, `/api/generate`,
//! `/api/tags`, …) so existing clients work unchanged, plus the gateway's
//! own surfaces: the unified chat endpoint, the tool listing, and the
//! workflow state machine.  Every response that fails carries the JSON
//! error envelope from [`error`].

pub mod error;
mod pipeline;
mod routes;
mod state;
mod stream;

pub use state::AppState;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let production = state.config.server.production;

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/version", get(routes::health::version))
        .route("/api/sessions", get(routes::sessions::stats))
        .route("/api/tags", get(routes::proxy::tags))
        .route("/api/generate", post(routes::proxy::generate))
        .route("/api/embeddings", post(routes::proxy::embeddings))
        .route("/api/pull", post(routes::proxy::pull))
        .route("/api/push", post(routes::proxy::push))
        .route("/api/chat", post(routes::chat::chat))
        .route("/api/chat/unified", post(routes::unified::unified))
        .route("/api/plan/enhanced", post(routes::unified::enhanced_plan))
        .route("/api/tools", get(routes::tools::list))
        .route(
            "/api/workflows",
            post(routes::workflows::start).get(routes::workflows::list),
        )
        .route("/api/workflows/cleanup", post(routes::workflows::cleanup))
        .route(
            "/api/workflows/:id",
            get(routes::workflows::get).delete(routes::workflows::cancel),
        )
        .route("/api/workflows/:id/phases", get(routes::workflows::phases))
        .route("/api/workflows/:id/execute", post(routes::workflows::execute))
        .route("/api/workflows/:id/pause", post(routes::workflows::pause))
        .route("/api/workflows/:id/resume", post(routes::workflows::resume))
        .layer(middleware::from_fn_with_state(
            production,
            error::error_envelope,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until ctrl-c.  Spawns the background sweepers first.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let port = state.config.server.port;
    state.spawn_sweepers();

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

// ─── Integration tests ───────────────────────────────────────────────────────
