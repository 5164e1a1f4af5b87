// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest priority.
/// Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide default
    paths.push(PathBuf::from("/etc/olle/config.yaml"));
    paths.push(PathBuf::from("/etc/olle/config.yml"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/olle/config.yaml"));
        paths.push(home.join(".config/olle/config.yml"));
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".olle.yaml"));
    paths.push(PathBuf::from(".olle.yml"));
    paths.push(PathBuf::from("olle.yaml"));
    paths.push(PathBuf::from("olle.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files, then applying
/// environment variable overrides.  The `extra` argument may provide an
/// explicit path (e.g. `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    load_with_env(extra, &|name| std::env::var(name).ok())
}

/// Same as [`load`], but reads environment variables through `env` so tests
/// can inject values without mutating process state.
pub fn load_with_env(
    extra: Option<&Path>,
    env: &dyn Fn(&str) -> Option<String>,
) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    apply_env(&mut config, env);
    Ok(config)
}

/// Environment variables win over every file layer.
fn apply_env(config: &mut Config, env: &dyn Fn(&str) -> Option<String>) {
    if let Some(port) = parse_env(env, "PORT") {
        config.server.port = port;
    }
    if let Some(url) = env("OLLAMA_BASE_URL") {
        config.backend.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(ms) = parse_env(env, "REQUEST_TIMEOUT") {
        config.backend.request_timeout_ms = ms;
    }
    if let Some(model) = env("DEFAULT_MODEL") {
        config.backend.default_model = model;
    }
    if let Some(model) = env("EMBEDDING_MODEL") {
        config.backend.embedding_model = model;
    }
    if let Some(n) = parse_env(env, "SESSION_MAX_HISTORY") {
        config.session.max_history = n;
    }
    if let Some(ms) = parse_env(env, "SESSION_TIMEOUT_MS") {
        config.session.timeout_ms = ms;
    }
    if let Some(b) = bool_env(env, "LOG_REQUESTS") {
        config.server.log_requests = b;
    }
    if let Some(b) = bool_env(env, "LOG_RESPONSES") {
        config.server.log_responses = b;
    }
    if let Some(b) = bool_env(env, "ENABLE_AGENTIC_ORCHESTRATION") {
        config.workflow.enabled = b;
    }
}

fn parse_env<T: std::str::FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = env(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no` in any case.
fn bool_env(env: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<bool> {
    let raw = env(name)?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => {
            warn!(var = name, value = %raw, "ignoring unparseable boolean override");
            None
        }
    }
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
