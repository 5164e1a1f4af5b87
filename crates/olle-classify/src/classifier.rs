// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use olle_ollama::{Backend, ModelInfo};

use crate::catalog::{Catalog, TaskCategory};
use crate::select;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Coding,
    TechnicalAnalysis,
    General,
    Embeddings,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coding => "coding",
            Self::TechnicalAnalysis => "technical_analysis",
            Self::General => "general",
            Self::Embeddings => "embeddings",
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "coding" => Self::Coding,
            "technical_analysis" => Self::TechnicalAnalysis,
            "embeddings" => Self::Embeddings,
            _ => Self::General,
        }
    }
}

/// Ordered: `VeryHigh > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Java,
    Cpp,
    Rust,
    Go,
    Sql,
    Bash,
    Docker,
    General,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::Java => "java",
            Self::Cpp => "cpp",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Sql => "sql",
            Self::Bash => "bash",
            Self::Docker => "docker",
            Self::General => "general",
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "python" => Self::Python,
            "javascript" => Self::Javascript,
            "typescript" => Self::Typescript,
            "java" => Self::Java,
            "cpp" => Self::Cpp,
            "rust" => Self::Rust,
            "go" => Self::Go,
            "sql" => Self::Sql,
            "bash" => Self::Bash,
            "docker" => Self::Docker,
            _ => Self::General,
        }
    }
}

/// The derived tuple that drives model selection and planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub task_type: TaskType,
    pub complexity: Complexity,
    pub language: Language,
    pub recommended_model: String,
    pub estimated_tokens: usize,
    pub needs_planning: bool,
    pub planning_steps: Vec<String>,
    pub reasoning: String,
}

/// Classifies request content against the bundled category catalog.
pub struct Classifier {
    catalog: Catalog,
    backend: Arc<dyn Backend>,
    embedding_model: String,
    default_model: String,
}

impl Classifier {
    pub fn new(backend: Arc<dyn Backend>, config: &olle_config::BackendConfig) -> Self {
        Self {
            catalog: crate::catalog::static_catalog(),
            backend,
            embedding_model: config.embedding_model.clone(),
            default_model: config.default_model.clone(),
        }
    }

    /// Default classification for requests with no usable content.
    pub fn default_classification(&self) -> Classification {
        Classification {
            task_type: TaskType::General,
            complexity: Complexity::Medium,
            language: Language::General,
            recommended_model: self.default_model.clone(),
            estimated_tokens: 0,
            needs_planning: false,
            planning_steps: Vec::new(),
            reasoning: "no user content; using defaults".into(),
        }
    }

    /// Classify `content` against the catalog and the installed inventory.
    ///
    /// Keyword matching decides everything; embeddings are consulted only
    /// when several task categories match, and an embeddings failure falls
    /// back to catalog order.
    pub async fn classify(&self, content: &str, inventory: &[ModelInfo]) -> Classification {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return self.default_classification();
        }
        let lower = trimmed.to_lowercase();

        let candidates = self.matching_categories(&lower);
        let task_type = match candidates.len() {
            0 => TaskType::General,
            1 => TaskType::from_name(&candidates[0].name),
            _ => self.break_tie(&lower, &candidates).await,
        };

        let complexity = self.detect_complexity(&lower);
        let language = self.detect_language(&lower);

        let recommended_model = select::recommend_model(
            &self.catalog,
            task_type,
            language,
            complexity,
            inventory,
            &self.default_model,
        );

        let needs_planning = complexity == Complexity::VeryHigh
            || (task_type == TaskType::Coding && complexity == Complexity::High)
            || self.catalog.planning.iter().any(|k| lower.contains(k.as_str()));

        let planning_steps = if needs_planning {
            planning_steps_for(task_type)
        } else {
            Vec::new()
        };

        let reasoning = format!(
            "{}/{} at {} complexity → {}",
            task_type.as_str(),
            language.as_str(),
            complexity.as_str(),
            recommended_model,
        );
        debug!(
            task = task_type.as_str(),
            complexity = complexity.as_str(),
            language = language.as_str(),
            model = %recommended_model,
            "classified request"
        );

        Classification {
            task_type,
            complexity,
            language,
            recommended_model,
            estimated_tokens: estimate_tokens(trimmed),
            needs_planning,
            planning_steps,
            reasoning,
        }
    }

    /// All task categories whose keywords hit, in catalog (priority) order.
    fn matching_categories(&self, lower: &str) -> Vec<&TaskCategory> {
        self.catalog
            .task_types
            .iter()
            .filter(|cat| {
                let keyword_hit = cat.keywords.iter().any(|k| lower.contains(k.as_str()));
                if !keyword_hit {
                    return false;
                }
                // Verb gate: categories that declare verbs also need one.
                cat.verbs.is_empty() || cat.verbs.iter().any(|v| lower.contains(v.as_str()))
            })
            .collect()
    }

    /// Pick among tied categories by embedding similarity to each anchor.
    /// Any backend failure keeps the catalog-order winner.
    async fn break_tie(&self, lower: &str, candidates: &[&TaskCategory]) -> TaskType {
        let first = TaskType::from_name(&candidates[0].name);

        let prompt_vec = match self.backend.embeddings(&self.embedding_model, lower).await {
            Ok(v) if !v.is_empty() => v,
            _ => {
                debug!("embeddings unavailable; keeping catalog-order task type");
                return first;
            }
        };

        let mut best = (first, f32::MIN);
        for cat in candidates {
            let anchor_vec = match self
                .backend
                .embeddings(&self.embedding_model, &cat.anchor)
                .await
            {
                Ok(v) if v.len() == prompt_vec.len() => v,
                _ => return first,
            };
            let score = cosine(&prompt_vec, &anchor_vec);
            if score > best.1 {
                best = (TaskType::from_name(&cat.name), score);
            }
        }
        best.0
    }

    fn detect_complexity(&self, lower: &str) -> Complexity {
        let tiers = &self.catalog.complexity;
        if tiers.very_high.iter().any(|k| lower.contains(k.as_str())) {
            Complexity::VeryHigh
        } else if tiers.high.iter().any(|k| lower.contains(k.as_str())) {
            Complexity::High
        } else if tiers.medium.iter().any(|k| lower.contains(k.as_str())) {
            Complexity::Medium
        } else {
            Complexity::Low
        }
    }

    fn detect_language(&self, lower: &str) -> Language {
        for entry in &self.catalog.languages {
            if entry.keywords.iter().any(|k| lower.contains(k.as_str())) {
                return Language::from_name(&entry.name);
            }
        }
        Language::General
    }

    /// Final model resolution for a request (see `select`): honor the
    /// client's model when it is installed and the classifier has no strong
    /// disagreement, otherwise substitute the recommendation.
    pub fn select_model(
        &self,
        requested: &str,
        classification: &Classification,
        inventory: &[ModelInfo],
    ) -> String {
        select::resolve_model(&self.catalog, requested, classification, inventory)
    }
}

/// Rough token estimate: ~4 characters per token.
fn estimate_tokens(content: &str) -> usize {
    content.chars().count().div_ceil(4)
}

fn planning_steps_for(task_type: TaskType) -> Vec<String> {
    let steps: &[&str] = match task_type {
        TaskType::Coding => &[
            "review the requirements and constraints",
            "sketch the module and interface layout",
            "implement the core path",
            "add tests for the main and edge cases",
            "refactor and document",
        ],
        _ => &[
            "break the request into sub-questions",
            "address each sub-question in order",
            "synthesize a final answer",
        ],
    };
    steps.iter().map(|s| s.to_string()).collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use olle_ollama::MockBackend;

    use super::*;

    fn make_classifier() -> Classifier {
        make_classifier_with(MockBackend::new())
    }

    fn make_classifier_with(backend: MockBackend) -> Classifier {
        Classifier::new(Arc::new(backend), &olle_config::BackendConfig::default())
    }

    fn inventory(names: &[&str]) -> Vec<ModelInfo> {
        names.iter().map(|n| ModelInfo::named(*n)).collect()
    }

    #[tokio::test]
    async fn empty_content_returns_default() {
        let c = make_classifier().classify("  ", &[]).await;
        assert_eq!(c.task_type, TaskType::General);
        assert_eq!(c.complexity, Complexity::Medium);
        assert_eq!(c.language, Language::General);
        assert!(!c.needs_planning);
    }

    #[tokio::test]
    async fn python_sort_request_is_low_complexity_coding() {
        // Spec scenario: "Write a Python function to sort a list"
        let inv = inventory(&["qwen2.5-coder:7b", "llama3.1:8b"]);
        let c = make_classifier()
            .classify("Write a Python function to sort a list", &inv)
            .await;
        assert_eq!(c.task_type, TaskType::Coding);
        assert_eq!(c.language, Language::Python);
        assert_eq!(c.complexity, Complexity::Low);
        assert_eq!(c.recommended_model, "qwen2.5-coder:7b");
        assert!(!c.reasoning.is_empty());
    }

    #[tokio::test]
    async fn noun_only_mention_of_code_terms_is_not_coding() {
        // "function" appears but no coding verb does.
        let c = make_classifier()
            .classify("what is the function of a seatbelt", &[])
            .await;
        assert_eq!(c.task_type, TaskType::General);
    }

    #[tokio::test]
    async fn architecture_prompt_triggers_planning() {
        let c = make_classifier()
            .classify("design the architecture for a new service", &[])
            .await;
        assert!(c.needs_planning);
        assert!(!c.planning_steps.is_empty());
    }

    #[tokio::test]
    async fn very_high_complexity_triggers_planning() {
        let c = make_classifier()
            .classify("build an entire application from scratch with microservice backend", &[])
            .await;
        assert_eq!(c.complexity, Complexity::VeryHigh);
        assert!(c.needs_planning);
    }

    #[tokio::test]
    async fn high_coding_triggers_planning() {
        let c = make_classifier()
            .classify("refactor this module to use async code", &[])
            .await;
        assert_eq!(c.task_type, TaskType::Coding);
        assert_eq!(c.complexity, Complexity::High);
        assert!(c.needs_planning);
    }

    #[tokio::test]
    async fn classification_is_deterministic() {
        let clf = make_classifier();
        let inv = inventory(&["llama3.1:8b"]);
        let a = clf.classify("implement a parser for csv files", &inv).await;
        let b = clf.classify("implement a parser for csv files", &inv).await;
        assert_eq!(a.task_type, b.task_type);
        assert_eq!(a.complexity, b.complexity);
        assert_eq!(a.recommended_model, b.recommended_model);
        assert_eq!(a.reasoning, b.reasoning);
    }

    #[tokio::test]
    async fn embeddings_failure_degrades_to_keyword_order() {
        // "analyze this code and fix the bug" hits both coding and
        // technical_analysis; the mock backend has no embeddings, so the
        // catalog-order winner (coding) must be kept.
        let c = make_classifier()
            .classify("analyze this code and fix the bug", &[])
            .await;
        assert_eq!(c.task_type, TaskType::Coding);
    }

    #[tokio::test]
    async fn embeddings_prompt_classifies_as_embeddings() {
        let c = make_classifier()
            .classify("compute the embedding vector for this sentence", &[])
            .await;
        assert_eq!(c.task_type, TaskType::Embeddings);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.5_f32, 0.25, 0.1];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_handles_zero_vector() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn serialization_uses_wire_names() {
        let c = Classification {
            task_type: TaskType::TechnicalAnalysis,
            complexity: Complexity::VeryHigh,
            language: Language::Cpp,
            recommended_model: "m".into(),
            estimated_tokens: 1,
            needs_planning: true,
            planning_steps: vec![],
            reasoning: "r".into(),
        };
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["taskType"], "technical_analysis");
        assert_eq!(v["complexity"], "very_high");
        assert_eq!(v["needsPlanning"], true);
    }
}
