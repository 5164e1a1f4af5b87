// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `/api/chat`: the streaming proxy.
//!
//! The pipeline resolves session, classification, context, and model; the
//! handler forwards the whitelisted payload and relays the reply.
//! Streaming responses pass through byte-for-byte except the single
//! first-chunk model rewrite.  The session is updated only after the
//! terminal chunk is relayed — a client that disconnects mid-stream drops
//! the generator, cancels the upstream call, and discards the turn.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde_json::Value;
use tracing::info;

use crate::{
    error::GatewayError,
    pipeline::{self, whitelist_payload},
    routes::user_agent,
    state::AppState,
    stream::{rewrite_model_value, ModelRewriter},
};

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    if state.config.server.log_requests {
        info!(body = %body, "chat request");
    }
    let chat = pipeline::prepare_chat(&state, &body, &user_agent(&headers)).await?;

    if !chat.prepared.request.stream {
        return unary_chat(&state, chat).await;
    }
    streaming_chat(state, chat).await
}

async fn unary_chat(
    state: &AppState,
    chat: pipeline::ChatPrepared,
) -> Result<Response, GatewayError> {
    let payload = whitelist_payload(&chat, false);
    let mut value = state.backend.chat(&payload).await?;
    if state.config.server.log_responses {
        info!(body = %value, "chat response");
    }

    let assistant = value["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    state.sessions.update(
        &chat.session_id,
        pipeline::completed_history(&chat.prepared.request, &chat.history, &assistant),
    );

    rewrite_model_value(&mut value);
    value["_ollamaGeek"] = pipeline::sideband(&chat.prepared);
    Ok(Json(value).into_response())
}

async fn streaming_chat(
    state: AppState,
    chat: pipeline::ChatPrepared,
) -> Result<Response, GatewayError> {
    let payload = whitelist_payload(&chat, true);
    let mut chunks = state.backend.chat_stream(&payload).await?;

    // Relay loop as a generator: pulls one upstream chunk per poll, so
    // client backpressure throttles the upstream read.  Dropping the body
    // (client disconnect) drops the upstream stream and skips the session
    // update.
    let ndjson = async_stream::stream! {
        let mut rewriter = ModelRewriter::new();
        let mut assistant = String::new();
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    if let Some(text) = chunk.value["message"]["content"].as_str() {
                        assistant.push_str(text);
                    }
                    let done = chunk.is_done();
                    let line = format!("{}\n", rewriter.apply(&chunk.line));
                    yield Ok::<_, std::io::Error>(line.into_bytes());
                    if done {
                        state.sessions.update(
                            &chat.session_id,
                            pipeline::completed_history(
                                &chat.prepared.request,
                                &chat.history,
                                &assistant,
                            ),
                        );
                        return;
                    }
                }
                Err(e) => {
                    // Mid-stream upstream failure: abort the client stream.
                    // No session update for the broken turn.
                    yield Err(std::io::Error::other(e.to_string()));
                    return;
                }
            }
        }
    };

    // Streaming body: hyper takes care of chunked transfer encoding.
    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(ndjson))
        .map_err(|e| GatewayError::Internal(e.to_string()))
}
