// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The in-stream model-name rewrite.
//!
//! A streaming chat response is relayed byte-for-byte, with one exception:
//! the first chunk that carries a `model` field gets a single textual
//! substitution tagging the selected model as gateway-enhanced.  The
//! "first chunk" state lives here, in the transform, so the relay loop
//! stays stateless.

/// Suffix appended to the model name in responses the gateway touched.
pub const MODEL_SUFFIX: &str = " (gateway-enhanced)";

/// Stateful single-substitution rewriter.
#[derive(Debug)]
pub struct ModelRewriter {
    done: bool,
}

impl ModelRewriter {
    pub fn new() -> Self {
        Self { done: false }
    }

    /// Apply the rewrite to one NDJSON line.  The first line containing a
    /// `model` field is rewritten; every later line passes through
    /// untouched.
    pub fn apply(&mut self, line: &str) -> String {
        if self.done {
            return line.to_string();
        }
        match rewrite_model_field(line) {
            Some(rewritten) => {
                self.done = true;
                rewritten
            }
            None => line.to_string(),
        }
    }
}

impl Default for ModelRewriter {
    fn default() -> Self {
        Self::new()
    }
}

/// One textual substitution of `"model":"<x>"` → `"model":"<x><suffix>"`.
/// Tolerates whitespace after the colon.  Returns `None` when the line has
/// no model field.
fn rewrite_model_field(line: &str) -> Option<String> {
    let key_at = line.find("\"model\"")?;
    let after_key = &line[key_at + "\"model\"".len()..];
    let colon = after_key.find(':')?;
    let after_colon = after_key[colon + 1..].trim_start();
    if !after_colon.starts_with('"') {
        return None;
    }

    // Locate the closing quote of the value within the original line.
    let value_start = line.len() - after_colon.len() + 1;
    let value_len = find_string_end(&line[value_start..])?;
    let insert_at = value_start + value_len;

    let mut out = String::with_capacity(line.len() + MODEL_SUFFIX.len());
    out.push_str(&line[..insert_at]);
    out.push_str(MODEL_SUFFIX);
    out.push_str(&line[insert_at..]);
    Some(out)
}

/// Length of a JSON string body up to (not including) its closing quote,
/// honoring backslash escapes.
fn find_string_end(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Rewrite the `model` field of a parsed (non-streaming) response value.
pub fn rewrite_model_value(value: &mut serde_json::Value) {
    if let Some(model) = value.get_mut("model") {
        if let Some(name) = model.as_str() {
            *model = serde_json::Value::String(format!("{name}{MODEL_SUFFIX}"));
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
