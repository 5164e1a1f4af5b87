// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Workflow templates.
//!
//! Two templates are built in — `fullstack_react` and `nodejs_api` — and a
//! synthesized `custom` template covers everything else.  Template choice
//! is keyword-driven; the instantiated copy is then adjusted for the
//! request (a "simple"/"quick" request gets tighter time estimates, a
//! "production"/"complex" one gets looser ones).

use serde::{Deserialize, Serialize};

use olle_tools::ProjectContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTemplate {
    pub name: String,
    pub description: String,
    /// Tool names this phase is expected to use (advisory, for planning).
    pub tools: Vec<String>,
    /// Phase names that must be completed before this one may run.
    pub dependencies: Vec<String>,
    /// Human-readable range, e.g. `"5-10 min"`.
    pub estimated_time: String,
    pub complexity: String,
}

impl PhaseTemplate {
    fn new(
        name: &str,
        description: &str,
        tools: &[&str],
        dependencies: &[&str],
        estimated_time: &str,
        complexity: &str,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            estimated_time: estimated_time.into(),
            complexity: complexity.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: String,
    pub description: String,
    pub phases: Vec<PhaseTemplate>,
}

/// The built-in template set.
pub fn builtin_templates() -> Vec<WorkflowTemplate> {
    vec![fullstack_react(), nodejs_api()]
}

fn fullstack_react() -> WorkflowTemplate {
    WorkflowTemplate {
        id: "fullstack_react".into(),
        description: "React frontend with a Node backend".into(),
        phases: vec![
            PhaseTemplate::new(
                "project_setup",
                "scaffold directories, manifests and git",
                &["create_directory", "create_file", "git_operation"],
                &[],
                "2-5 min",
                "low",
            ),
            // backend_development and frontend_development both depend only
            // on project_setup: they stay independently executable.
            PhaseTemplate::new(
                "backend_development",
                "Express API server and routes",
                &["create_file", "install_dependency", "run_terminal"],
                &["project_setup"],
                "10-20 min",
                "high",
            ),
            PhaseTemplate::new(
                "frontend_development",
                "React components and client wiring",
                &["create_file", "install_dependency", "run_terminal"],
                &["project_setup"],
                "10-20 min",
                "high",
            ),
            PhaseTemplate::new(
                "testing_setup",
                "test harness for both halves",
                &["install_dependency", "create_file", "run_tests"],
                &["backend_development", "frontend_development"],
                "5-10 min",
                "medium",
            ),
            PhaseTemplate::new(
                "deployment_prep",
                "build scripts and deployment configuration",
                &["create_file", "run_terminal"],
                &["testing_setup"],
                "5-10 min",
                "medium",
            ),
        ],
    }
}

fn nodejs_api() -> WorkflowTemplate {
    WorkflowTemplate {
        id: "nodejs_api".into(),
        description: "Node.js REST API".into(),
        phases: vec![
            PhaseTemplate::new(
                "project_setup",
                "scaffold the project and manifest",
                &["create_directory", "create_file", "git_operation"],
                &[],
                "2-5 min",
                "low",
            ),
            PhaseTemplate::new(
                "api_development",
                "routes, handlers and middleware",
                &["create_file", "install_dependency"],
                &["project_setup"],
                "10-15 min",
                "medium",
            ),
            PhaseTemplate::new(
                "testing",
                "test suite and a smoke run",
                &["install_dependency", "create_file", "run_tests"],
                &["api_development"],
                "5-10 min",
                "medium",
            ),
        ],
    }
}

/// Synthesized template for requests that match no built-in.
fn custom(user_request: &str) -> WorkflowTemplate {
    WorkflowTemplate {
        id: "custom".into(),
        description: format!("synthesized plan for: {user_request}"),
        phases: vec![
            PhaseTemplate::new(
                "project_setup",
                "prepare the workspace",
                &["create_directory", "create_file"],
                &[],
                "2-5 min",
                "low",
            ),
            PhaseTemplate::new(
                "implementation",
                "carry out the requested work",
                &["create_file", "edit_file", "run_terminal"],
                &["project_setup"],
                "10-20 min",
                "medium",
            ),
            PhaseTemplate::new(
                "verification",
                "check the result",
                &["run_tests", "search_files"],
                &["implementation"],
                "5-10 min",
                "low",
            ),
        ],
    }
}

/// Choose and instantiate a template for a request, applying
/// request/context-dependent adjustments to the copy.
pub fn template_for_request(user_request: &str, context: &ProjectContext) -> WorkflowTemplate {
    let lower = user_request.to_lowercase();
    let project_type = context
        .project_type
        .as_deref()
        .unwrap_or("")
        .to_lowercase();

    let mut template = if lower.contains("react")
        || lower.contains("fullstack")
        || lower.contains("full-stack")
        || project_type.contains("react")
    {
        fullstack_react()
    } else if lower.contains("api")
        || lower.contains("rest")
        || lower.contains("server")
        || project_type.contains("node")
    {
        nodejs_api()
    } else {
        custom(user_request)
    };

    adjust_for_request(&mut template, &lower);
    template
}

/// Scale time estimates and complexity from request wording.
fn adjust_for_request(template: &mut WorkflowTemplate, lower: &str) {
    if lower.contains("simple") || lower.contains("quick") || lower.contains("minimal") {
        for phase in &mut template.phases {
            phase.estimated_time = halve_estimate(&phase.estimated_time);
            if phase.complexity == "high" {
                phase.complexity = "medium".into();
            }
        }
    } else if lower.contains("production") || lower.contains("complex") || lower.contains("scalable")
    {
        for phase in &mut template.phases {
            phase.estimated_time = double_estimate(&phase.estimated_time);
            if phase.complexity == "low" {
                phase.complexity = "medium".into();
            }
        }
    }
}

fn halve_estimate(range: &str) -> String {
    scale_estimate(range, |n| (n / 2).max(1))
}

fn double_estimate(range: &str) -> String {
    scale_estimate(range, |n| n * 2)
}

/// Rewrite `"A-B min"` with `f` applied to both bounds; anything that does
/// not look like a range passes through unchanged.
fn scale_estimate(range: &str, f: impl Fn(u32) -> u32) -> String {
    let Some(rest) = range.strip_suffix(" min") else {
        return range.to_string();
    };
    let Some((lo, hi)) = rest.split_once('-') else {
        return range.to_string();
    };
    match (lo.trim().parse::<u32>(), hi.trim().parse::<u32>()) {
        (Ok(a), Ok(b)) => format!("{}-{} min", f(a), f(b)),
        _ => range.to_string(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(project_type: &str) -> ProjectContext {
        ProjectContext {
            project_type: Some(project_type.into()),
            project_name: None,
            target_dir: None,
        }
    }

    #[test]
    fn react_request_selects_fullstack_template() {
        let t = template_for_request("build a react todo app", &ProjectContext::default());
        assert_eq!(t.id, "fullstack_react");
        assert_eq!(t.phases.len(), 5);
    }

    #[test]
    fn rest_api_request_selects_nodejs_api() {
        let t = template_for_request("create a REST API", &ctx("nodejs"));
        assert_eq!(t.id, "nodejs_api");
        let names: Vec<&str> = t.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["project_setup", "api_development", "testing"]);
    }

    #[test]
    fn unmatched_request_synthesizes_custom() {
        let t = template_for_request("organize my notes", &ProjectContext::default());
        assert_eq!(t.id, "custom");
        assert_eq!(t.phases.len(), 3);
    }

    #[test]
    fn fullstack_backend_and_frontend_are_independent() {
        let t = template_for_request("a react app", &ProjectContext::default());
        let backend = t.phases.iter().find(|p| p.name == "backend_development").unwrap();
        let frontend = t.phases.iter().find(|p| p.name == "frontend_development").unwrap();
        assert_eq!(backend.dependencies, vec!["project_setup"]);
        assert_eq!(frontend.dependencies, vec!["project_setup"]);
        let testing = t.phases.iter().find(|p| p.name == "testing_setup").unwrap();
        assert_eq!(
            testing.dependencies,
            vec!["backend_development", "frontend_development"]
        );
    }

    #[test]
    fn simple_wording_halves_estimates() {
        let t = template_for_request("a simple REST API", &ProjectContext::default());
        assert_eq!(t.phases[0].estimated_time, "1-2 min");
    }

    #[test]
    fn production_wording_doubles_estimates_and_raises_floor() {
        let t = template_for_request("a production ready REST API", &ProjectContext::default());
        assert_eq!(t.phases[0].estimated_time, "4-10 min");
        assert_eq!(t.phases[0].complexity, "medium");
    }

    #[test]
    fn scale_estimate_passes_unrecognized_formats_through() {
        assert_eq!(scale_estimate("a while", |n| n), "a while");
        assert_eq!(scale_estimate("5 min", |n| n * 2), "5 min");
    }

    #[test]
    fn builtin_templates_have_dense_phase_dependencies() {
        for template in builtin_templates() {
            let names: Vec<&str> = template.phases.iter().map(|p| p.name.as_str()).collect();
            for phase in &template.phases {
                for dep in &phase.dependencies {
                    assert!(
                        names.contains(&dep.as_str()),
                        "{}: dependency {dep} is not a phase",
                        template.id
                    );
                }
            }
        }
    }
}
