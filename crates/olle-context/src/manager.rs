// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use olle_classify::{Complexity, TaskType};
use olle_config::ContextConfig;

use crate::{
    enhance::{ContextEnhancer, NoopEnhancer},
    heuristics, Context, ContextMethod, FileOrigin,
};

/// Assembles workspace context with an LRU cache in front.
pub struct ContextManager {
    workspace_root: PathBuf,
    patterns: Vec<Regex>,
    cache: Mutex<LruCache<String, Context>>,
    enhancer: Arc<dyn ContextEnhancer>,
}

impl ContextManager {
    pub fn new(config: &ContextConfig) -> Self {
        Self::with_enhancer(config, Arc::new(NoopEnhancer))
    }

    pub fn with_enhancer(config: &ContextConfig, enhancer: Arc<dyn ContextEnhancer>) -> Self {
        let workspace_root = config
            .workspace_root
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let capacity = NonZeroUsize::new(config.cache_capacity.max(1))
            .expect("capacity is clamped to at least 1");
        Self {
            workspace_root,
            patterns: heuristics::reference_patterns(),
            cache: Mutex::new(LruCache::new(capacity)),
            enhancer,
        }
    }

    /// Cache key: the first 100 characters of the prompt plus the task type.
    fn cache_key(content: &str, task_type: TaskType) -> String {
        let prefix: String = content.chars().take(100).collect();
        let mut hasher = Sha256::new();
        hasher.update(prefix.as_bytes());
        hasher.update(b"|");
        hasher.update(task_type.as_str().as_bytes());
        hex::encode(hasher.finalize())[..24].to_string()
    }

    /// Assemble context for a request.  Total: never returns an error; a
    /// failure in any probe degrades to [`Context::fallback`].
    pub async fn smart_context(
        &self,
        content: &str,
        task_type: TaskType,
        complexity: Complexity,
    ) -> Context {
        let key = Self::cache_key(content, task_type);
        if let Some(hit) = self.cache.lock().unwrap().get(&key) {
            debug!("context cache hit");
            return hit.clone();
        }

        let mut context = self.heuristic_pass(content, task_type).await;

        if self.should_enhance(content, task_type, complexity) {
            context = self.enhancer.enhance(content, context).await;
        }

        self.cache.lock().unwrap().put(key, context.clone());
        context
    }

    /// The fast pass.  Wrapped so a panic-free error path always produces a
    /// well-formed context.
    async fn heuristic_pass(&self, content: &str, task_type: TaskType) -> Context {
        let lower = content.to_lowercase();
        let coding = task_type == TaskType::Coding
            || heuristics::CODING_HINTS.iter().any(|k| lower.contains(k));

        let mut files = Vec::new();
        if coding {
            files = heuristics::referenced_files(&self.patterns, content, &self.workspace_root);
            if files.is_empty() {
                files = heuristics::enumerate_sources(
                    &self.workspace_root,
                    5,
                    FileOrigin::ProjectStructure,
                );
                if let Some(parent) = self.workspace_root.parent() {
                    files.extend(heuristics::enumerate_sources(
                        parent,
                        3,
                        FileOrigin::ParentProjectStructure,
                    ));
                }
            }
        }

        let dependencies = heuristics::manifest_dependencies(&self.workspace_root);

        let wants_git = coding || heuristics::GIT_HINTS.iter().any(|k| lower.contains(k));
        let git_status = if wants_git {
            heuristics::git_status(&self.workspace_root).await
        } else {
            None
        };

        let explicit = files
            .iter()
            .filter(|f| f.origin == FileOrigin::ExplicitReference)
            .count();
        let reasoning = format!(
            "{} file(s) ({} referenced), deps: {}, git: {}",
            files.len(),
            explicit,
            dependencies.is_some(),
            git_status.is_some(),
        );

        Context {
            files,
            dependencies,
            git_status,
            reasoning,
            method: ContextMethod::Heuristic,
        }
    }

    /// AI refinement is reserved for requests where it can pay off.
    fn should_enhance(&self, content: &str, task_type: TaskType, complexity: Complexity) -> bool {
        if complexity == Complexity::VeryHigh {
            return true;
        }
        if task_type == TaskType::Coding && content.len() > 200 {
            return true;
        }
        let lower = content.to_lowercase();
        lower.contains("architecture") || lower.contains("design")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
