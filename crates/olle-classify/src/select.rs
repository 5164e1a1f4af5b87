// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Model selection: classification + installed inventory → concrete model.

use tracing::debug;

use olle_ollama::ModelInfo;

use crate::catalog::Catalog;
use crate::classifier::{Classification, Complexity, Language, TaskType};

/// First preferred model that is actually installed.
fn first_installed<'a>(preferences: &'a [String], inventory: &[ModelInfo]) -> Option<&'a str> {
    preferences
        .iter()
        .find(|p| inventory.iter().any(|m| m.name == **p))
        .map(String::as_str)
}

/// Recommend a model for a classification, before considering what the
/// client asked for.
pub(crate) fn recommend_model(
    catalog: &Catalog,
    task_type: TaskType,
    language: Language,
    complexity: Complexity,
    inventory: &[ModelInfo],
    default_model: &str,
) -> String {
    // Very high complexity coding: the largest installed coding model beats
    // every preference list.
    if complexity == Complexity::VeryHigh && task_type == TaskType::Coding {
        if let Some(largest) = largest_coding_model(catalog, inventory) {
            return largest;
        }
    }

    // Coding with a detected language: the language sublist overrides, but
    // only when one of its models is installed.
    if task_type == TaskType::Coding && language != Language::General {
        if let Some(sublist) = catalog.language_models.get(language.as_str()) {
            if let Some(model) = first_installed(sublist, inventory) {
                return model.to_string();
            }
        }
    }

    if let Some(preferences) = catalog.models.get(task_type.as_str()) {
        if let Some(model) = first_installed(preferences, inventory) {
            return model.to_string();
        }
    }

    default_model.to_string()
}

/// Largest installed model whose family is a known coding family.
/// Size comes from the inventory; entries without a size sort last.
fn largest_coding_model(catalog: &Catalog, inventory: &[ModelInfo]) -> Option<String> {
    inventory
        .iter()
        .filter(|m| catalog.coding_families.iter().any(|f| m.family() == f))
        .max_by_key(|m| m.size.unwrap_or(0))
        .map(|m| m.name.clone())
}

/// Resolve the model the gateway will actually call.
///
/// The client's model is honored when the inventory contains it verbatim
/// and the classifier has no strong disagreement.  Strong disagreement is
/// a task-type mismatch: a coding task pointed at a non-coding model while
/// the recommended coding model is installed.  A requested model missing
/// from the inventory falls back to family matching (the prefix before
/// `:`) to tolerate tag drift, then to the recommendation.
pub(crate) fn resolve_model(
    catalog: &Catalog,
    requested: &str,
    classification: &Classification,
    inventory: &[ModelInfo],
) -> String {
    let installed_verbatim = inventory.iter().any(|m| m.name == requested);

    if installed_verbatim {
        let strong_disagreement = classification.task_type == TaskType::Coding
            && !is_coding_model(catalog, requested)
            && inventory
                .iter()
                .any(|m| m.name == classification.recommended_model);
        if !strong_disagreement {
            return requested.to_string();
        }
        debug!(
            requested,
            substituted = %classification.recommended_model,
            "classifier overrides requested model"
        );
        return classification.recommended_model.clone();
    }

    // Tag drift: "llama3.1" or "llama3.1:latest" should still land on an
    // installed "llama3.1:8b".
    let requested_family = requested.split(':').next().unwrap_or(requested);
    if let Some(m) = inventory.iter().find(|m| m.family() == requested_family) {
        debug!(requested, resolved = %m.name, "resolved model by family prefix");
        return m.name.clone();
    }

    classification.recommended_model.clone()
}

fn is_coding_model(catalog: &Catalog, name: &str) -> bool {
    let family = name.split(':').next().unwrap_or(name);
    catalog.coding_families.iter().any(|f| f == family)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::catalog::static_catalog;

    use super::*;

    fn inventory(entries: &[(&str, u64)]) -> Vec<ModelInfo> {
        entries
            .iter()
            .map(|(name, size)| ModelInfo {
                name: name.to_string(),
                size: Some(*size),
            })
            .collect()
    }

    fn classification(task: TaskType, complexity: Complexity, model: &str) -> Classification {
        Classification {
            task_type: task,
            complexity,
            language: Language::General,
            recommended_model: model.into(),
            estimated_tokens: 0,
            needs_planning: false,
            planning_steps: Vec::new(),
            reasoning: String::new(),
        }
    }

    #[test]
    fn recommendation_prefers_first_installed() {
        let catalog = static_catalog();
        let inv = inventory(&[("codellama:13b", 1), ("llama3.1:8b", 1)]);
        let m = recommend_model(
            &catalog,
            TaskType::Coding,
            Language::General,
            Complexity::Medium,
            &inv,
            "fallback",
        );
        // qwen2.5-coder:7b is preferred but not installed.
        assert_eq!(m, "codellama:13b");
    }

    #[test]
    fn language_sublist_overrides_task_list() {
        let catalog = static_catalog();
        let inv = inventory(&[("deepseek-coder:6.7b", 1), ("codellama:13b", 1)]);
        let m = recommend_model(
            &catalog,
            TaskType::Coding,
            Language::Rust,
            Complexity::Medium,
            &inv,
            "fallback",
        );
        // Rust sublist: qwen2.5-coder:7b (absent), deepseek-coder:6.7b.
        assert_eq!(m, "deepseek-coder:6.7b");
    }

    #[test]
    fn empty_sublist_intersection_falls_back_to_task_default() {
        let catalog = static_catalog();
        let inv = inventory(&[("codellama:7b", 1)]);
        let m = recommend_model(
            &catalog,
            TaskType::Coding,
            Language::Python,
            Complexity::Medium,
            &inv,
            "fallback",
        );
        // Python sublist has qwen2.5-coder:7b and codellama:13b — neither
        // installed — so the coding task list applies.
        assert_eq!(m, "codellama:7b");
    }

    #[test]
    fn nothing_installed_falls_back_to_default() {
        let catalog = static_catalog();
        let m = recommend_model(
            &catalog,
            TaskType::General,
            Language::General,
            Complexity::Low,
            &[],
            "llama3.1:8b",
        );
        assert_eq!(m, "llama3.1:8b");
    }

    #[test]
    fn very_high_coding_picks_largest_coding_model() {
        let catalog = static_catalog();
        let inv = inventory(&[
            ("qwen2.5-coder:7b", 4_000_000_000),
            ("codellama:34b", 19_000_000_000),
            ("llama3.1:70b", 40_000_000_000),
        ]);
        let m = recommend_model(
            &catalog,
            TaskType::Coding,
            Language::Python,
            Complexity::VeryHigh,
            &inv,
            "fallback",
        );
        // llama3.1 is bigger but not a coding family.
        assert_eq!(m, "codellama:34b");
    }

    #[test]
    fn requested_installed_model_is_honored() {
        let catalog = static_catalog();
        let inv = inventory(&[("llama3.1:8b", 1), ("qwen2.5-coder:7b", 1)]);
        let c = classification(TaskType::General, Complexity::Low, "qwen2.5-coder:7b");
        assert_eq!(resolve_model(&catalog, "llama3.1:8b", &c, &inv), "llama3.1:8b");
    }

    #[test]
    fn strong_disagreement_substitutes_recommendation() {
        let catalog = static_catalog();
        let inv = inventory(&[("llama3.1:8b", 1), ("qwen2.5-coder:7b", 1)]);
        let c = classification(TaskType::Coding, Complexity::High, "qwen2.5-coder:7b");
        assert_eq!(
            resolve_model(&catalog, "llama3.1:8b", &c, &inv),
            "qwen2.5-coder:7b"
        );
    }

    #[test]
    fn coding_task_substitutes_even_at_low_complexity() {
        // "Write a Python function to sort a list" on a general model:
        // the installed coding recommendation wins.
        let catalog = static_catalog();
        let inv = inventory(&[("llama3.1:8b", 1), ("qwen2.5-coder:7b", 1)]);
        let c = classification(TaskType::Coding, Complexity::Low, "qwen2.5-coder:7b");
        assert_eq!(
            resolve_model(&catalog, "llama3.1:8b", &c, &inv),
            "qwen2.5-coder:7b"
        );
    }

    #[test]
    fn coding_request_on_coding_model_is_honored() {
        let catalog = static_catalog();
        let inv = inventory(&[("codellama:13b", 1), ("qwen2.5-coder:7b", 1)]);
        let c = classification(TaskType::Coding, Complexity::High, "qwen2.5-coder:7b");
        assert_eq!(
            resolve_model(&catalog, "codellama:13b", &c, &inv),
            "codellama:13b"
        );
    }

    #[test]
    fn missing_model_resolves_by_family_prefix() {
        let catalog = static_catalog();
        let inv = inventory(&[("llama3.1:8b", 1)]);
        let c = classification(TaskType::General, Complexity::Low, "mistral:7b");
        assert_eq!(
            resolve_model(&catalog, "llama3.1:latest", &c, &inv),
            "llama3.1:8b"
        );
    }

    #[test]
    fn unknown_model_falls_back_to_recommendation() {
        let catalog = static_catalog();
        let inv = inventory(&[("llama3.1:8b", 1)]);
        let c = classification(TaskType::General, Complexity::Low, "llama3.1:8b");
        assert_eq!(resolve_model(&catalog, "phi3:mini", &c, &inv), "llama3.1:8b");
    }
}
