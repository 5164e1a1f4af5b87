// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::BackendError;

/// One newline-terminated NDJSON object from a streaming endpoint.
///
/// The raw line is preserved so the streaming proxy can relay bytes
/// unchanged (or perform its single first-chunk substitution) without
/// re-serializing — re-serialization would reorder keys and break
/// byte-for-byte passthrough.
#[derive(Debug, Clone)]
pub struct NdjsonChunk {
    /// The exact line as received, without the trailing newline.
    pub line: String,
    /// The decoded object.
    pub value: Value,
}

impl NdjsonChunk {
    /// Parse a complete line.  Returns `None` for blank lines.
    pub fn parse(line: &str) -> Option<Result<Self, BackendError>> {
        let trimmed = line.trim_end_matches('\r');
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => Some(Ok(Self {
                line: trimmed.to_string(),
                value,
            })),
            Err(e) => Some(Err(BackendError::Transport(format!(
                "invalid NDJSON chunk: {e}"
            )))),
        }
    }

    /// Terminal-chunk marker in the daemon's format.
    pub fn is_done(&self) -> bool {
        self.value.get("done").and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Lazy sequence of NDJSON chunks from a streaming call.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<NdjsonChunk, BackendError>> + Send>>;

/// One entry of the daemon's model inventory (`GET /api/tags`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ModelInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
        }
    }

    /// The model family before the `:` tag, e.g. `"llama3.1"` for
    /// `"llama3.1:8b"`.
    pub fn family(&self) -> &str {
        self.name.split(':').next().unwrap_or(&self.name)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_raw_line_verbatim() {
        let line = r#"{"model":"llama3.1:8b","done":false}"#;
        let chunk = NdjsonChunk::parse(line).unwrap().unwrap();
        assert_eq!(chunk.line, line);
        assert_eq!(chunk.value["model"], "llama3.1:8b");
    }

    #[test]
    fn parse_strips_carriage_return() {
        let chunk = NdjsonChunk::parse("{\"done\":true}\r").unwrap().unwrap();
        assert_eq!(chunk.line, "{\"done\":true}");
        assert!(chunk.is_done());
    }

    #[test]
    fn blank_line_yields_nothing() {
        assert!(NdjsonChunk::parse("").is_none());
        assert!(NdjsonChunk::parse("\r").is_none());
    }

    #[test]
    fn garbage_line_is_a_transport_error() {
        let res = NdjsonChunk::parse("not json").unwrap();
        assert!(matches!(res, Err(BackendError::Transport(_))));
    }

    #[test]
    fn done_flag_defaults_to_false() {
        let chunk = NdjsonChunk::parse(r#"{"message":{"content":"hi"}}"#)
            .unwrap()
            .unwrap();
        assert!(!chunk.is_done());
    }

    #[test]
    fn family_splits_on_colon() {
        assert_eq!(ModelInfo::named("llama3.1:8b").family(), "llama3.1");
        assert_eq!(ModelInfo::named("codellama").family(), "codellama");
    }
}
