// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTTP client for the Ollama native API.
//!
//! The gateway talks to a single local model daemon over its native JSON
//! API (`/api/generate`, `/api/chat`, `/api/embeddings`, `/api/tags`, …).
//! This crate is the only place that knows the daemon's wire format; every
//! other crate works through the [`Backend`] trait so tests can substitute
//! [`MockBackend`].
//!
//! Streaming endpoints return NDJSON — one JSON object per line.  A single
//! object may be split across TCP packets, so the stream reader keeps a
//! line buffer and only yields complete newline-terminated chunks.
//!
//! No retries happen at this layer; callers decide whether a failure is
//! recoverable.

mod client;
mod error;
mod mock;
mod types;

pub use client::OllamaClient;
pub use error::BackendError;
pub use mock::MockBackend;
pub use types::{ChunkStream, ModelInfo, NdjsonChunk};

use async_trait::async_trait;
use serde_json::Value;

/// The model daemon as seen by the rest of the gateway.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Unary `POST /api/generate` (the payload carries `stream: false`).
    async fn generate(&self, body: &Value) -> Result<Value, BackendError>;

    /// Unary `POST /api/chat`.
    async fn chat(&self, body: &Value) -> Result<Value, BackendError>;

    /// Streaming `POST /api/generate` — lazy NDJSON chunk sequence.
    async fn generate_stream(&self, body: &Value) -> Result<ChunkStream, BackendError>;

    /// Streaming `POST /api/chat`.
    async fn chat_stream(&self, body: &Value) -> Result<ChunkStream, BackendError>;

    /// Embedding vector for `prompt` under the given model.
    async fn embeddings(&self, model: &str, prompt: &str) -> Result<Vec<f32>, BackendError>;

    /// Installed model inventory (`GET /api/tags`).
    async fn tags(&self) -> Result<Vec<ModelInfo>, BackendError>;

    /// `POST /api/pull` (unary; the daemon reports progress in the body).
    async fn pull(&self, body: &Value) -> Result<Value, BackendError>;

    /// `POST /api/push`.
    async fn push(&self, body: &Value) -> Result<Value, BackendError>;

    /// Model metadata (`POST /api/show`).
    async fn show(&self, model: &str) -> Result<Value, BackendError>;

    /// `POST /api/copy`.
    async fn copy(&self, source: &str, destination: &str) -> Result<(), BackendError>;

    /// `DELETE /api/delete`.
    async fn delete(&self, model: &str) -> Result<(), BackendError>;
}
