// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Category catalog: the fixed keyword sets and model preferences that
//! drive classification.  Bundled as YAML so the matching logic stays
//! data-free and deterministic.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TaskCategory {
    pub name: String,
    /// Short phrase embedded as the semantic anchor for tie-breaking.
    pub anchor: String,
    /// Verb indicators; when present, at least one must match in addition
    /// to a keyword (used by `coding` to avoid noun-only false positives).
    #[serde(default)]
    pub verbs: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComplexityTiers {
    pub very_high: Vec<String>,
    pub high: Vec<String>,
    pub medium: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageEntry {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub task_types: Vec<TaskCategory>,
    pub complexity: ComplexityTiers,
    pub languages: Vec<LanguageEntry>,
    pub planning: Vec<String>,
    pub models: HashMap<String, Vec<String>>,
    pub language_models: HashMap<String, Vec<String>>,
    pub coding_families: Vec<String>,
}

/// Parse the bundled catalog.
pub fn static_catalog() -> Catalog {
    let yaml = include_str!("../categories.yaml");
    serde_yaml::from_str(yaml).expect("bundled categories.yaml must be valid")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_catalog_parses() {
        let c = static_catalog();
        assert!(!c.task_types.is_empty());
        assert!(!c.complexity.very_high.is_empty());
        assert!(!c.languages.is_empty());
    }

    #[test]
    fn coding_category_requires_verbs() {
        let c = static_catalog();
        let coding = c.task_types.iter().find(|t| t.name == "coding").unwrap();
        assert!(!coding.verbs.is_empty());
    }

    #[test]
    fn every_task_type_has_a_model_list() {
        let c = static_catalog();
        for t in &c.task_types {
            assert!(c.models.contains_key(&t.name), "missing models for {}", t.name);
        }
        assert!(c.models.contains_key("general"));
    }

    #[test]
    fn language_model_lists_reference_known_languages() {
        let c = static_catalog();
        let names: Vec<&str> = c.languages.iter().map(|l| l.name.as_str()).collect();
        for lang in c.language_models.keys() {
            assert!(names.contains(&lang.as_str()), "unknown language {lang}");
        }
    }
}
