// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Smart workspace context.
//!
//! Before a request reaches the model, the gateway gathers cheap facts
//! about the workspace: files the prompt refers to, dependency manifests,
//! and version-control status.  The fast heuristic pass is pure string
//! matching plus a handful of filesystem probes; an optional AI hook can
//! refine the result for the few requests that warrant it.  Results are
//! cached in a bounded LRU keyed on the prompt prefix and task type.
//!
//! Context gathering never fails a request: any underlying error collapses
//! to the fallback context (empty fields, `method = fallback`).

mod enhance;
mod heuristics;
mod manager;

pub use enhance::{ContextEnhancer, ModelEnhancer, NoopEnhancer};
pub use manager::ContextManager;

use serde::{Deserialize, Serialize};

/// How a file ended up in the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOrigin {
    /// The prompt named the file and it exists.
    ExplicitReference,
    /// Picked up from enumerating the workspace root.
    ProjectStructure,
    /// Picked up from enumerating the workspace parent.
    ParentProjectStructure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFile {
    pub path: String,
    pub origin: FileOrigin,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    pub runtime: Vec<String>,
    pub dev: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitStatus {
    pub changed_count: usize,
    pub sample: Vec<String>,
}

/// How the context was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMethod {
    /// Fast keyword/filesystem pass only.
    Heuristic,
    /// Heuristic pass refined by the AI hook.
    Hybrid,
    /// Heuristic gathering failed; empty placeholder.
    Fallback,
}

/// Workspace facts attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub files: Vec<ContextFile>,
    pub dependencies: Option<Dependencies>,
    pub git_status: Option<GitStatus>,
    pub reasoning: String,
    pub method: ContextMethod,
}

impl Context {
    /// The well-formed empty context used when gathering fails.
    pub fn fallback() -> Self {
        Self {
            files: Vec::new(),
            dependencies: None,
            git_status: None,
            reasoning: "context gathering failed; proceeding without workspace facts".into(),
            method: ContextMethod::Fallback,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_empty_and_marked() {
        let c = Context::fallback();
        assert!(c.files.is_empty());
        assert!(c.dependencies.is_none());
        assert!(c.git_status.is_none());
        assert_eq!(c.method, ContextMethod::Fallback);
    }

    #[test]
    fn origin_serializes_snake_case() {
        let f = ContextFile {
            path: "src/main.rs".into(),
            origin: FileOrigin::ExplicitReference,
        };
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["origin"], "explicit_reference");
    }
}
