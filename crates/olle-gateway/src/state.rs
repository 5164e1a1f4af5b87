// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use olle_classify::Classifier;
use olle_config::Config;
use olle_context::{ContextManager, ModelEnhancer};
use olle_ollama::{Backend, OllamaClient};
use olle_session::SessionStore;
use olle_tools::{ToolEngine, ToolPlanner};
use olle_workflow::Orchestrator;

/// Shared application state threaded through every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn Backend>,
    pub classifier: Arc<Classifier>,
    pub context: Arc<ContextManager>,
    pub sessions: Arc<SessionStore>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Production wiring: a real Ollama client behind every subsystem.
    pub fn new(config: Config) -> Self {
        let backend: Arc<dyn Backend> = Arc::new(OllamaClient::new(&config.backend));
        Self::with_backend(config, backend)
    }

    /// Wiring with an injected backend (tests use [`olle_ollama::MockBackend`]).
    pub fn with_backend(config: Config, backend: Arc<dyn Backend>) -> Self {
        let classifier = Arc::new(Classifier::new(backend.clone(), &config.backend));
        let enhancer = Arc::new(ModelEnhancer::new(
            backend.clone(),
            config.backend.default_model.clone(),
        ));
        let context = Arc::new(ContextManager::with_enhancer(&config.context, enhancer));
        let sessions = Arc::new(SessionStore::new(&config.session));

        let workspace_root = config
            .workflow
            .workspace_root
            .clone()
            .unwrap_or_else(|| ".".to_string());
        let orchestrator = Arc::new(Orchestrator::new(
            ToolPlanner::new(backend.clone(), config.backend.default_model.clone()),
            ToolEngine::new(workspace_root),
            config.workflow.retention_ms,
        ));

        Self {
            config: Arc::new(config),
            backend,
            classifier,
            context,
            sessions,
            orchestrator,
        }
    }

    /// Start the background sweepers (sessions, workflows).  Called once
    /// from `serve`; detached tasks run for the process lifetime.
    pub fn spawn_sweepers(&self) {
        self.sessions.spawn_sweeper();
        self.orchestrator.spawn_sweeper();
    }
}
