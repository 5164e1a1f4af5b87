// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `bool::default()`
/// (i.e. `false`), so fields that should be enabled unless the user turns
/// them off need a named function.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port the gateway listens on.  Env: `PORT`.
    pub port: u16,
    /// Log every inbound request body at info level.  Env: `LOG_REQUESTS`.
    #[serde(default)]
    pub log_requests: bool,
    /// Log upstream response bodies (non-streaming only).  Env: `LOG_RESPONSES`.
    #[serde(default)]
    pub log_responses: bool,
    /// Mask internal error details from clients.  When true, any 500 is
    /// reported as "Internal Server Error" and the cause stays in the logs.
    #[serde(default = "default_true")]
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3003,
            log_requests: false,
            log_responses: false,
            production: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the Ollama daemon.  Env: `OLLAMA_BASE_URL`.
    ///
    /// ```yaml
    /// backend:
    ///   base_url: http://gpu-box.local:11434
    /// ```
    pub base_url: String,
    /// Per-request timeout for chat/generate calls, in milliseconds.
    /// Env: `REQUEST_TIMEOUT`.
    pub request_timeout_ms: u64,
    /// Timeout for auxiliary calls (classification, embeddings), in
    /// milliseconds.  These should fail fast so the request pipeline can
    /// fall back to keyword heuristics.
    pub classify_timeout_ms: u64,
    /// Model used when classification produces no better candidate.
    /// Env: `DEFAULT_MODEL`.
    pub default_model: String,
    /// Model used for embedding requests issued by the classifier.
    /// Env: `EMBEDDING_MODEL`.
    pub embedding_model: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            request_timeout_ms: 120_000,
            classify_timeout_ms: 30_000,
            default_model: "llama3.1:8b".into(),
            embedding_model: "nomic-embed-text:latest".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum messages retained per session (oldest dropped first).
    /// Env: `SESSION_MAX_HISTORY`.
    pub max_history: usize,
    /// Idle time after which a session expires, in milliseconds.
    /// Env: `SESSION_TIMEOUT_MS`.
    pub timeout_ms: i64,
    /// Interval between eviction sweeps, in milliseconds.
    pub sweep_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: 50,
            timeout_ms: 1_800_000,
            sweep_interval_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Directory treated as the workspace root for file references and
    /// manifest/git probes.  Defaults to the process working directory.
    pub workspace_root: Option<String>,
    /// Capacity of the smart-context LRU cache.
    pub cache_capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            cache_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Master switch for the workflow/tool-execution surface.
    /// Env: `ENABLE_AGENTIC_ORCHESTRATION`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Directory tools are allowed to write into.  Relative tool paths are
    /// resolved against this.  Defaults to the process working directory.
    pub workspace_root: Option<String>,
    /// Age after which terminal workflows are removed by the cleanup
    /// sweeper, in milliseconds.
    pub retention_ms: i64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workspace_root: None,
            retention_ms: 86_400_000,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.server.port, 3003);
        assert_eq!(c.backend.base_url, "http://localhost:11434");
        assert_eq!(c.backend.embedding_model, "nomic-embed-text:latest");
        assert_eq!(c.session.max_history, 50);
        assert_eq!(c.session.timeout_ms, 1_800_000);
        assert_eq!(c.context.cache_capacity, 100);
        assert!(c.workflow.enabled);
    }

    #[test]
    fn empty_yaml_deserializes_to_defaults() {
        let c: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(c.server.port, 3003);
        assert!(c.workflow.enabled);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let c: Config = serde_yaml::from_str("server:\n  port: 8080\n").unwrap();
        assert_eq!(c.server.port, 8080);
        assert_eq!(c.session.max_history, 50);
    }

    #[test]
    fn workflow_can_be_disabled() {
        let c: Config = serde_yaml::from_str("workflow:\n  enabled: false\n").unwrap();
        assert!(!c.workflow.enabled);
    }
}
