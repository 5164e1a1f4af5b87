// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Straight passthrough routes: tags, embeddings, pull, push, and the
//! classification-aware generate.

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::GatewayError,
    pipeline::{self, whitelist_generate_payload},
    state::AppState,
    stream::{rewrite_model_value, ModelRewriter},
};

pub async fn tags(State(state): State<AppState>) -> Result<Json<Value>, GatewayError> {
    let models = state.backend.tags().await?;
    Ok(Json(json!({ "models": models })))
}

pub async fn embeddings(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, GatewayError> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::BadRequest("'model' is required".into()))?;
    let prompt = body
        .get("prompt")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::BadRequest("'prompt' is required".into()))?;
    let embedding = state.backend.embeddings(model, prompt).await?;
    Ok(Json(json!({ "embedding": embedding })))
}

pub async fn pull(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, GatewayError> {
    Ok(Json(state.backend.pull(&body).await?))
}

pub async fn push(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, GatewayError> {
    Ok(Json(state.backend.push(&body).await?))
}

/// `/api/generate`: same classification + context + model substitution as
/// chat, but prompt-shaped and sessionless — the session store belongs to
/// the chat flow and must not accumulate entries for generate clients.
pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    if state.config.server.log_requests {
        info!(body = %body, "generate request");
    }
    let prepared = pipeline::prepare(&state, &body).await?;
    if prepared.request.prompt.is_none() {
        return Err(GatewayError::BadRequest("'prompt' is required".into()));
    }

    if !prepared.request.stream {
        let payload = whitelist_generate_payload(&prepared, false);
        let mut value = state.backend.generate(&payload).await?;
        if state.config.server.log_responses {
            info!(body = %value, "generate response");
        }
        rewrite_model_value(&mut value);
        value["_ollamaGeek"] = pipeline::sideband(&prepared);
        return Ok(Json(value).into_response());
    }

    let payload = whitelist_generate_payload(&prepared, true);
    let chunks = state.backend.generate_stream(&payload).await?;
    let mut rewriter = ModelRewriter::new();
    let ndjson = chunks.map(move |item| match item {
        Ok(chunk) => Ok(format!("{}\n", rewriter.apply(&chunk.line)).into_bytes()),
        Err(e) => Err(std::io::Error::other(e.to_string())),
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(ndjson))
        .map_err(|e| GatewayError::Internal(e.to_string()))
}
