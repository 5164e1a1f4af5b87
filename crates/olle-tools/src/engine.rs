// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{GitOp, Tool, ToolAction, ToolError};

/// Outcome of one tool execution.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub name: &'static str,
    pub success: bool,
    pub critical: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of executing all tools of a phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseExecution {
    pub results: Vec<ToolResult>,
    /// True when a critical tool failed — the phase must fail.
    pub critical_failure: bool,
}

/// Stateless dispatcher over the tool vocabulary.
///
/// All filesystem paths are resolved against the workspace root; terminal
/// commands are dispatched fire-and-forget (success means the process
/// spawned, matching a planner that wants to keep moving while an install
/// runs).
pub struct ToolEngine {
    workspace_root: PathBuf,
}

impl ToolEngine {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    /// Execute a phase's tools: priority order, same-phase dependencies
    /// gate execution, critical failures poison the phase.
    pub async fn execute_phase(&self, tools: Vec<Tool>) -> PhaseExecution {
        let mut ordered: Vec<Tool> = tools;
        // Stable sort: equal priorities keep plan order.
        ordered.sort_by_key(|t| std::cmp::Reverse(t.priority));

        let mut results: Vec<ToolResult> = Vec::with_capacity(ordered.len());
        let mut succeeded: HashSet<&'static str> = HashSet::new();
        let mut critical_failure = false;
        let mut pending: Vec<Tool> = ordered;

        // Dependency scheduling: run every tool whose same-phase
        // dependencies have succeeded; repeat until nothing changes.  What
        // remains is blocked (missing or failed dependency).
        loop {
            let mut progressed = false;
            let mut still_blocked = Vec::new();

            for tool in pending {
                let ready = tool
                    .dependencies
                    .iter()
                    .all(|d| succeeded.contains(d.as_str()));
                if !ready {
                    still_blocked.push(tool);
                    continue;
                }

                progressed = true;
                let result = self.execute_one(&tool).await;
                if result.success {
                    succeeded.insert(result.name);
                } else if result.critical {
                    warn!(tool = result.name, "critical tool failed");
                    critical_failure = true;
                } else {
                    debug!(tool = result.name, "non-critical tool failed; continuing");
                }
                results.push(result);
            }

            if still_blocked.is_empty() || !progressed {
                for tool in still_blocked {
                    let critical = tool.critical;
                    if critical {
                        critical_failure = true;
                    }
                    results.push(ToolResult {
                        name: tool.name(),
                        success: false,
                        critical,
                        output: String::new(),
                        error: Some(format!(
                            "unsatisfied dependencies: {}",
                            tool.dependencies.join(", ")
                        )),
                    });
                }
                break;
            }
            pending = still_blocked;
        }

        PhaseExecution {
            results,
            critical_failure,
        }
    }

    async fn execute_one(&self, tool: &Tool) -> ToolResult {
        let name = tool.name();
        debug!(tool = name, "executing tool");
        let outcome = self.run_action(&tool.action).await;
        match outcome {
            Ok(output) => ToolResult {
                name,
                success: true,
                critical: tool.critical,
                output,
                error: None,
            },
            Err(e) => ToolResult {
                name,
                success: false,
                critical: tool.critical,
                output: String::new(),
                error: Some(e.to_string()),
            },
        }
    }

    async fn run_action(&self, action: &ToolAction) -> Result<String, ToolError> {
        match action {
            ToolAction::CreateFile { path, content } => {
                let full = self.resolve(path)?;
                if let Some(parent) = full.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|source| {
                        ToolError::WriteFailure { path: path.clone(), source }
                    })?;
                }
                tokio::fs::write(&full, content)
                    .await
                    .map_err(|source| ToolError::WriteFailure { path: path.clone(), source })?;
                Ok(format!("created {path}"))
            }
            ToolAction::EditFile { path, content } => {
                let full = self.resolve(path)?;
                if !full.is_file() {
                    return Err(ToolError::NotFound(path.clone()));
                }
                tokio::fs::write(&full, content)
                    .await
                    .map_err(|source| ToolError::WriteFailure { path: path.clone(), source })?;
                Ok(format!("edited {path}"))
            }
            ToolAction::CreateDirectory { path } => {
                let full = self.resolve(path)?;
                tokio::fs::create_dir_all(&full)
                    .await
                    .map_err(|source| ToolError::WriteFailure { path: path.clone(), source })?;
                Ok(format!("created directory {path}"))
            }
            ToolAction::RunTerminal { command, cwd } => {
                self.dispatch_command(command, cwd.as_deref())
            }
            ToolAction::GitOperation { operation, commit_message } => {
                let command = match operation {
                    GitOp::Init => "git init".to_string(),
                    GitOp::Add => "git add .".to_string(),
                    GitOp::Commit => format!(
                        "git commit -m '{}'",
                        commit_message
                            .as_deref()
                            .unwrap_or_default()
                            .replace('\'', r"'\''")
                    ),
                    GitOp::Push => "git push".to_string(),
                    GitOp::Other(op) => format!("git {op}"),
                };
                self.dispatch_command(&command, None)
            }
            ToolAction::InstallDependency { command }
            | ToolAction::RunTests { command }
            | ToolAction::ConfigureLinter { command }
            | ToolAction::SearchFiles { command } => self.dispatch_command(command, None),
        }
    }

    /// Fire-and-forget terminal dispatch: success is a successful spawn,
    /// not a zero exit code.
    fn dispatch_command(&self, command: &str, cwd: Option<&str>) -> Result<String, ToolError> {
        let dir = match cwd {
            Some(c) => self.resolve(c)?,
            None => self.workspace_root.clone(),
        };
        let spawned = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&dir)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                debug!(command, "dispatched terminal command");
                // Reap in the background so the child never zombies.
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
                Ok(format!("dispatched: {command}"))
            }
            Err(e) => Err(ToolError::WriteFailure {
                path: command.to_string(),
                source: e,
            }),
        }
    }

    /// Resolve a path inside the workspace.  Absolute paths are allowed
    /// only when they already point into the workspace; anything escaping
    /// the root is rejected.  Lexical checks only — the target usually
    /// does not exist yet, so `canonicalize` is not an option.
    fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            let normalized = lexical_normalize(candidate);
            if !normalized.starts_with(&self.workspace_root) {
                return Err(ToolError::PathEscape(path.to_string()));
            }
            return Ok(normalized);
        }
        // Relative: `..` must never climb above the workspace root.
        let mut depth: i32 = 0;
        for component in candidate.components() {
            match component {
                std::path::Component::ParentDir => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(ToolError::PathEscape(path.to_string()));
                    }
                }
                std::path::Component::Normal(_) => depth += 1,
                _ => {}
            }
        }
        Ok(self.workspace_root.join(candidate))
    }
}

/// Remove `.` and resolve `..` segments without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ToolSpec;

    fn tool(name: &str, params: serde_json::Value) -> Tool {
        Tool::validate(ToolSpec::new(name, params)).unwrap()
    }

    fn engine(dir: &Path) -> ToolEngine {
        ToolEngine::new(dir)
    }

    #[tokio::test]
    async fn create_file_makes_parents() {
        let dir = tempfile::tempdir().unwrap();
        let result = engine(dir.path())
            .execute_phase(vec![tool(
                "create_file",
                json!({ "path": "src/deep/app.js", "content": "hi" }),
            )])
            .await;
        assert!(!result.critical_failure);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/deep/app.js")).unwrap(),
            "hi"
        );
    }

    #[tokio::test]
    async fn edit_file_fails_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let result = engine(dir.path())
            .execute_phase(vec![tool(
                "edit_file",
                json!({ "path": "ghost.js", "content": "x" }),
            )])
            .await;
        // edit_file is not critical by name, so the phase survives.
        assert!(!result.critical_failure);
        assert!(!result.results[0].success);
        assert!(result.results[0].error.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn edit_file_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "old").unwrap();
        engine(dir.path())
            .execute_phase(vec![tool(
                "edit_file",
                json!({ "path": "app.js", "content": "new" }),
            )])
            .await;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app.js")).unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn priority_orders_execution() {
        let dir = tempfile::tempdir().unwrap();
        let mut low = tool("create_file", json!({ "path": "low.js", "content": "" }));
        low.priority = 1;
        let mut high = tool("create_file", json!({ "path": "high.js", "content": "" }));
        high.priority = 10;
        let result = engine(dir.path()).execute_phase(vec![low, high]).await;
        assert_eq!(result.results.len(), 2);
        // Both are create_file; order is observable through the output text.
        assert!(result.results[0].output.contains("high.js"));
        assert!(result.results[1].output.contains("low.js"));
    }

    #[tokio::test]
    async fn dependency_gates_execution_within_phase() {
        let dir = tempfile::tempdir().unwrap();
        let mut dependent = tool("create_file", json!({ "path": "b.js", "content": "" }));
        dependent.dependencies = vec!["create_directory".into()];
        // Dependent is listed first but must run second.
        let dirs = tool("create_directory", json!({ "path": "sub" }));
        let result = engine(dir.path()).execute_phase(vec![dependent, dirs]).await;
        assert!(!result.critical_failure);
        assert_eq!(result.results[0].name, "create_directory");
        assert_eq!(result.results[1].name, "create_file");
    }

    #[tokio::test]
    async fn unsatisfiable_dependency_marks_tool_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut blocked = tool("run_tests", json!({}));
        blocked.dependencies = vec!["install_dependency".into()];
        let result = engine(dir.path()).execute_phase(vec![blocked]).await;
        assert!(!result.results[0].success);
        assert!(result.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("unsatisfied"));
    }

    #[tokio::test]
    async fn critical_failure_poisons_phase() {
        let dir = tempfile::tempdir().unwrap();
        // Force a critical failure with an explicit flag on edit_file.
        let mut critical_edit = tool(
            "edit_file",
            json!({ "path": "missing.js", "content": "x" }),
        );
        critical_edit.critical = true;
        let result = engine(dir.path()).execute_phase(vec![critical_edit]).await;
        assert!(result.critical_failure);
    }

    #[tokio::test]
    async fn run_terminal_reports_success_on_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let result = engine(dir.path())
            .execute_phase(vec![tool("run_terminal", json!({ "command": "true" }))])
            .await;
        assert!(result.results[0].success);
        assert!(result.results[0].output.contains("dispatched"));
    }

    #[tokio::test]
    async fn path_escape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = engine(dir.path())
            .execute_phase(vec![tool(
                "create_file",
                json!({ "path": "../../etc/owned.js", "content": "x" }),
            )])
            .await;
        assert!(!result.results[0].success);
        assert!(result.critical_failure);
    }

    #[tokio::test]
    async fn absolute_path_outside_workspace_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let e = engine(dir.path()).resolve("/etc/passwd").unwrap_err();
        assert!(matches!(e, ToolError::PathEscape(_)));
        let inside = dir.path().join("ok.js");
        assert!(engine(dir.path()).resolve(inside.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn git_commit_is_dispatched_as_terminal_command() {
        let dir = tempfile::tempdir().unwrap();
        let result = engine(dir.path())
            .execute_phase(vec![tool(
                "git_operation",
                json!({ "operation": "init" }),
            )])
            .await;
        assert!(result.results[0].success);
    }
}
