// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use olle_config::BackendConfig;

use crate::{
    types::{ChunkStream, ModelInfo, NdjsonChunk},
    Backend, BackendError,
};

/// Reqwest-backed driver for the Ollama daemon.
pub struct OllamaClient {
    base_url: String,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("olle/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Unary POST; the whole response body is one JSON document.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, BackendError> {
        debug!(path, "backend request");
        let resp = self
            .client
            .post(self.url(path))
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), text));
        }
        Ok(resp.json().await?)
    }

    /// Streaming POST; yields NDJSON chunks as complete lines arrive.
    ///
    /// No total timeout is applied — a healthy generation can legitimately
    /// run for minutes.  The connect timeout still bounds a dead daemon.
    async fn post_stream(&self, path: &str, body: &Value) -> Result<ChunkStream, BackendError> {
        debug!(path, "backend stream request");
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), text));
        }

        // A chunk boundary is a TCP artifact, not a line boundary.  Keep a
        // buffer across chunks; emit only complete newline-terminated lines.
        let byte_stream = resp.bytes_stream();
        let chunk_stream = byte_stream
            .scan(String::new(), |buf, chunk| {
                let items: Vec<Result<NdjsonChunk, BackendError>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_complete_lines(buf)
                    }
                    Err(e) => vec![Err(e.into())],
                };
                std::future::ready(Some(items))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(chunk_stream))
    }
}

/// Drain all complete `\n`-terminated lines from `buf` into parsed chunks.
///
/// A trailing incomplete line stays in `buf` until the next TCP chunk
/// extends it.
fn drain_complete_lines(buf: &mut String) -> Vec<Result<NdjsonChunk, BackendError>> {
    let mut out = Vec::new();
    while let Some(nl) = buf.find('\n') {
        let line = buf[..nl].to_string();
        *buf = buf[nl + 1..].to_string();
        if let Some(item) = NdjsonChunk::parse(&line) {
            out.push(item);
        }
    }
    out
}

#[async_trait]
impl Backend for OllamaClient {
    async fn generate(&self, body: &Value) -> Result<Value, BackendError> {
        self.post_json("/api/generate", body).await
    }

    async fn chat(&self, body: &Value) -> Result<Value, BackendError> {
        self.post_json("/api/chat", body).await
    }

    async fn generate_stream(&self, body: &Value) -> Result<ChunkStream, BackendError> {
        self.post_stream("/api/generate", body).await
    }

    async fn chat_stream(&self, body: &Value) -> Result<ChunkStream, BackendError> {
        self.post_stream("/api/chat", body).await
    }

    async fn embeddings(&self, model: &str, prompt: &str) -> Result<Vec<f32>, BackendError> {
        let body = json!({ "model": model, "prompt": prompt });
        let resp = self.post_json("/api/embeddings", &body).await?;
        let vector = resp
            .get("embedding")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_f64)
                    .map(|f| f as f32)
                    .collect()
            })
            .unwrap_or_default();
        Ok(vector)
    }

    async fn tags(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let resp = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), text));
        }
        let body: Value = resp.json().await?;
        let models = body
            .get("models")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| {
                        let name = m.get("name").and_then(Value::as_str)?;
                        Some(ModelInfo {
                            name: name.to_string(),
                            size: m.get("size").and_then(Value::as_u64),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }

    async fn pull(&self, body: &Value) -> Result<Value, BackendError> {
        self.post_json("/api/pull", body).await
    }

    async fn push(&self, body: &Value) -> Result<Value, BackendError> {
        self.post_json("/api/push", body).await
    }

    async fn show(&self, model: &str) -> Result<Value, BackendError> {
        self.post_json("/api/show", &json!({ "name": model })).await
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<(), BackendError> {
        self.post_json(
            "/api/copy",
            &json!({ "source": source, "destination": destination }),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, model: &str) -> Result<(), BackendError> {
        let resp = self
            .client
            .delete(self.url("/api/delete"))
            .timeout(self.request_timeout)
            .json(&json!({ "name": model }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), text));
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_client() -> OllamaClient {
        OllamaClient::new(&BackendConfig {
            base_url: "http://localhost:11434/".into(),
            ..Default::default()
        })
    }

    #[test]
    fn base_url_trailing_slash_stripped() {
        let c = make_client();
        assert_eq!(c.url("/api/chat"), "http://localhost:11434/api/chat");
    }

    #[test]
    fn drain_emits_each_complete_line() {
        let mut buf = "{\"a\":1}\n{\"b\":2}\n".to_string();
        let items = drain_complete_lines(&mut buf);
        assert_eq!(items.len(), 2);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_retains_incomplete_tail() {
        let mut buf = "{\"a\":1}\n{\"b\":".to_string();
        let items = drain_complete_lines(&mut buf);
        assert_eq!(items.len(), 1);
        assert_eq!(buf, "{\"b\":");
    }

    #[test]
    fn chunk_split_across_packets_reassembles() {
        let full = r#"{"model":"llama3.1:8b","message":{"content":"hi"},"done":false}"#;
        let (left, right) = full.split_at(20);

        let mut buf = String::new();
        buf.push_str(left);
        assert!(drain_complete_lines(&mut buf).is_empty());

        buf.push_str(right);
        buf.push('\n');
        let items = drain_complete_lines(&mut buf);
        assert_eq!(items.len(), 1);
        let chunk = items.into_iter().next().unwrap().unwrap();
        assert_eq!(chunk.line, full);
    }

    #[test]
    fn blank_lines_between_chunks_are_skipped() {
        let mut buf = "{\"a\":1}\n\n{\"b\":2}\n".to_string();
        let items = drain_complete_lines(&mut buf);
        assert_eq!(items.len(), 2);
    }
}
