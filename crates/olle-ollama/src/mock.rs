// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};

use crate::{
    types::{ChunkStream, ModelInfo, NdjsonChunk},
    Backend, BackendError,
};

/// Pre-scripted backend for tests.  Each chat/generate call pops the next
/// script from the front of the queue; a script is the NDJSON line sequence
/// the daemon would have emitted.  The last payload sent is recorded so
/// tests can assert on the outbound whitelist.
#[derive(Default)]
pub struct MockBackend {
    scripts: Mutex<Vec<Vec<String>>>,
    inventory: Vec<ModelInfo>,
    /// Embedding vector returned for every embeddings call; `None` makes
    /// embeddings fail so degradation paths can be exercised.
    embedding: Option<Vec<f32>>,
    /// The most recent chat/generate payload, for whitelist assertions.
    pub last_payload: Arc<Mutex<Option<Value>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the installed model inventory reported by `tags`.
    pub fn with_inventory(mut self, names: &[&str]) -> Self {
        self.inventory = names.iter().map(|n| ModelInfo::named(*n)).collect();
        self
    }

    /// Queue one scripted response (a sequence of NDJSON lines).
    pub fn with_script(self, lines: &[&str]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push(lines.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Queue a single-line unary-style response.
    pub fn with_reply(self, content: &str) -> Self {
        let line = json!({
            "model": "mock-model",
            "message": { "role": "assistant", "content": content },
            "done": true,
        })
        .to_string();
        self.with_script(&[line.as_str()])
    }

    pub fn with_embedding(mut self, vector: Vec<f32>) -> Self {
        self.embedding = Some(vector);
        self
    }

    fn pop_script(&self) -> Result<Vec<String>, BackendError> {
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            return Err(BackendError::BackendUnavailable(
                "mock backend: no scripted response left".into(),
            ));
        }
        Ok(scripts.remove(0))
    }

    fn record(&self, body: &Value) {
        *self.last_payload.lock().unwrap() = Some(body.clone());
    }

    fn unary(&self, body: &Value) -> Result<Value, BackendError> {
        self.record(body);
        let script = self.pop_script()?;
        let last = script
            .last()
            .ok_or_else(|| BackendError::Transport("mock backend: empty script".into()))?;
        serde_json::from_str(last)
            .map_err(|e| BackendError::Transport(format!("mock backend: bad script line: {e}")))
    }

    fn streaming(&self, body: &Value) -> Result<ChunkStream, BackendError> {
        self.record(body);
        let script = self.pop_script()?;
        let items: Vec<Result<NdjsonChunk, BackendError>> = script
            .iter()
            .filter_map(|line| NdjsonChunk::parse(line))
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn generate(&self, body: &Value) -> Result<Value, BackendError> {
        self.unary(body)
    }

    async fn chat(&self, body: &Value) -> Result<Value, BackendError> {
        self.unary(body)
    }

    async fn generate_stream(&self, body: &Value) -> Result<ChunkStream, BackendError> {
        self.streaming(body)
    }

    async fn chat_stream(&self, body: &Value) -> Result<ChunkStream, BackendError> {
        self.streaming(body)
    }

    async fn embeddings(&self, _model: &str, _prompt: &str) -> Result<Vec<f32>, BackendError> {
        match &self.embedding {
            Some(v) => Ok(v.clone()),
            None => Err(BackendError::BackendUnavailable(
                "mock backend: embeddings disabled".into(),
            )),
        }
    }

    async fn tags(&self) -> Result<Vec<ModelInfo>, BackendError> {
        Ok(self.inventory.clone())
    }

    async fn pull(&self, body: &Value) -> Result<Value, BackendError> {
        self.record(body);
        Ok(json!({ "status": "success" }))
    }

    async fn push(&self, body: &Value) -> Result<Value, BackendError> {
        self.record(body);
        Ok(json!({ "status": "success" }))
    }

    async fn show(&self, model: &str) -> Result<Value, BackendError> {
        Ok(json!({ "modelfile": format!("FROM {model}") }))
    }

    async fn copy(&self, _source: &str, _destination: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn delete(&self, _model: &str) -> Result<(), BackendError> {
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
