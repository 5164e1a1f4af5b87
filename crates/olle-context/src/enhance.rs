// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! AI refinement hook for heuristic context.
//!
//! Most requests never reach this: the manager only calls the enhancer for
//! very-high complexity, long coding prompts, or explicit
//! architecture/design talk.  Implementations must be idempotent and must
//! return the input context unchanged on any failure — enhancement is a
//! bonus, never a gate.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use olle_ollama::Backend;

use crate::{Context, ContextMethod, FileOrigin};

#[async_trait]
pub trait ContextEnhancer: Send + Sync {
    /// Refine a heuristic context.  May extend `files` and `reasoning` and
    /// switch `method` to [`ContextMethod::Hybrid`]; everything else stays.
    async fn enhance(&self, content: &str, context: Context) -> Context;
}

/// Hook that does nothing — the default wiring.
#[derive(Default)]
pub struct NoopEnhancer;

#[async_trait]
impl ContextEnhancer for NoopEnhancer {
    async fn enhance(&self, _content: &str, context: Context) -> Context {
        context
    }
}

/// Asks the backend which additional workspace files matter for the prompt.
pub struct ModelEnhancer {
    backend: Arc<dyn Backend>,
    model: String,
}

impl ModelEnhancer {
    pub fn new(backend: Arc<dyn Backend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ContextEnhancer for ModelEnhancer {
    async fn enhance(&self, content: &str, mut context: Context) -> Context {
        let known: Vec<&str> = context.files.iter().map(|f| f.path.as_str()).collect();
        let prompt = format!(
            "A developer asked:\n{content}\n\nKnown relevant files: {known:?}\n\
             List up to 3 additional file paths (relative, one per line) that \
             are likely relevant. Reply with paths only, or NONE.",
        );
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });

        let reply = match self.backend.chat(&body).await {
            Ok(v) => v["message"]["content"].as_str().unwrap_or("").to_string(),
            Err(e) => {
                debug!(error = %e, "context enhancement skipped");
                return context;
            }
        };

        let mut added = 0;
        for line in reply.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if line.eq_ignore_ascii_case("none") {
                break;
            }
            let path = line.trim_start_matches(['-', '*', ' ']).to_string();
            if path.is_empty() || path.contains(' ') {
                continue; // prose, not a path
            }
            if context.files.iter().any(|f| f.path == path) {
                continue;
            }
            context.files.push(crate::ContextFile {
                path,
                origin: FileOrigin::ProjectStructure,
            });
            added += 1;
            if added == 3 {
                break;
            }
        }

        if added > 0 {
            context.method = ContextMethod::Hybrid;
            context
                .reasoning
                .push_str(&format!("; model suggested {added} more file(s)"));
        }
        context
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use olle_ollama::MockBackend;

    use super::*;
    use crate::ContextFile;

    fn heuristic_context() -> Context {
        Context {
            files: vec![ContextFile {
                path: "src/main.rs".into(),
                origin: FileOrigin::ExplicitReference,
            }],
            dependencies: None,
            git_status: None,
            reasoning: "1 referenced file".into(),
            method: ContextMethod::Heuristic,
        }
    }

    #[tokio::test]
    async fn noop_returns_input_unchanged() {
        let ctx = heuristic_context();
        let out = NoopEnhancer.enhance("whatever", ctx.clone()).await;
        assert_eq!(out, ctx);
    }

    #[tokio::test]
    async fn model_suggestions_extend_files_and_switch_method() {
        let backend = MockBackend::new().with_reply("src/lib.rs\nsrc/util.rs");
        let enhancer = ModelEnhancer::new(Arc::new(backend), "m");
        let out = enhancer.enhance("refactor", heuristic_context()).await;
        assert_eq!(out.files.len(), 3);
        assert_eq!(out.method, ContextMethod::Hybrid);
        assert!(out.reasoning.contains("2 more"));
    }

    #[tokio::test]
    async fn duplicate_and_prose_lines_are_ignored() {
        let backend =
            MockBackend::new().with_reply("src/main.rs\nthese are not paths at all\nsrc/new.rs");
        let enhancer = ModelEnhancer::new(Arc::new(backend), "m");
        let out = enhancer.enhance("x", heuristic_context()).await;
        let paths: Vec<&str> = out.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/main.rs", "src/new.rs"]);
    }

    #[tokio::test]
    async fn backend_failure_returns_input_unchanged() {
        // MockBackend with no scripts fails every chat call.
        let enhancer = ModelEnhancer::new(Arc::new(MockBackend::new()), "m");
        let ctx = heuristic_context();
        let out = enhancer.enhance("x", ctx.clone()).await;
        assert_eq!(out, ctx);
    }

    #[tokio::test]
    async fn none_reply_changes_nothing() {
        let backend = MockBackend::new().with_reply("NONE");
        let enhancer = ModelEnhancer::new(Arc::new(backend), "m");
        let ctx = heuristic_context();
        let out = enhancer.enhance("x", ctx.clone()).await;
        assert_eq!(out, ctx);
    }
}
