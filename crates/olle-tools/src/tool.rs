// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ToolError;

/// Tool names that are critical even without an explicit flag: if one of
/// these fails, later tools in the phase have nothing to stand on.
const CRITICAL_BY_NAME: &[&str] = &["create_directory", "create_file", "run_terminal"];

/// A tool request as it arrives from the model or a client — untyped
/// parameter bag, not yet validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub critical: Option<bool>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
            critical: None,
            priority: None,
            dependencies: Vec::new(),
        }
    }

    /// Parse a loose JSON object.  Accepts both the nested shape
    /// (`{"name": ..., "params": {...}}`) and the flat shape where the
    /// parameters sit beside `name`.
    pub fn from_value(value: &Value) -> Result<Self, ToolError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ToolError::InvalidPlan("tool entry is not an object".into()))?;
        let name = obj
            .get("name")
            .or_else(|| obj.get("tool"))
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidPlan("tool entry has no name".into()))?
            .to_string();

        let params = match obj.get("params").or_else(|| obj.get("parameters")) {
            Some(p) if p.is_object() => p.clone(),
            _ => {
                // Flat shape: everything that isn't metadata is a parameter.
                let mut flat = serde_json::Map::new();
                for (k, v) in obj {
                    if !matches!(
                        k.as_str(),
                        "name" | "tool" | "params" | "parameters" | "critical" | "priority"
                            | "dependencies"
                    ) {
                        flat.insert(k.clone(), v.clone());
                    }
                }
                Value::Object(flat)
            }
        };

        Ok(Self {
            name,
            params,
            critical: obj.get("critical").and_then(Value::as_bool),
            priority: obj.get("priority").and_then(Value::as_i64),
            dependencies: obj
                .get("dependencies")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitOp {
    Init,
    Add,
    Commit,
    Push,
    Other(String),
}

impl GitOp {
    fn parse(s: &str) -> Self {
        match s {
            "init" => Self::Init,
            "add" => Self::Add,
            "commit" => Self::Commit,
            "push" => Self::Push,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The validated tool vocabulary.  One variant per tool name; parameters
/// are checked once, here, so the engine works on typed data only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ToolAction {
    CreateFile {
        path: String,
        content: String,
    },
    EditFile {
        path: String,
        content: String,
    },
    CreateDirectory {
        path: String,
    },
    RunTerminal {
        command: String,
        cwd: Option<String>,
    },
    GitOperation {
        operation: GitOp,
        commit_message: Option<String>,
    },
    InstallDependency {
        command: String,
    },
    RunTests {
        command: String,
    },
    ConfigureLinter {
        command: String,
    },
    SearchFiles {
        command: String,
    },
}

impl ToolAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateFile { .. } => "create_file",
            Self::EditFile { .. } => "edit_file",
            Self::CreateDirectory { .. } => "create_directory",
            Self::RunTerminal { .. } => "run_terminal",
            Self::GitOperation { .. } => "git_operation",
            Self::InstallDependency { .. } => "install_dependency",
            Self::RunTests { .. } => "run_tests",
            Self::ConfigureLinter { .. } => "configure_linter",
            Self::SearchFiles { .. } => "search_files",
        }
    }
}

/// A validated, schedulable tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub action: ToolAction,
    pub critical: bool,
    pub priority: i64,
    pub dependencies: Vec<String>,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        self.action.name()
    }

    /// Wire shape used by the HTTP surface: the validated parameters nested
    /// under `params`, metadata beside them.
    pub fn wire(&self) -> Value {
        let mut action = serde_json::to_value(&self.action)
            .expect("tool actions serialize to plain objects");
        let params = {
            let obj = action
                .as_object_mut()
                .expect("tagged enum serializes to an object");
            obj.remove("name");
            Value::Object(std::mem::take(obj))
        };
        serde_json::json!({
            "name": self.name(),
            "params": params,
            "critical": self.critical,
            "priority": self.priority,
            "dependencies": self.dependencies,
        })
    }

    /// Validate a [`ToolSpec`] into a typed tool.
    pub fn validate(spec: ToolSpec) -> Result<Self, ToolError> {
        let action = build_action(&spec)?;
        let critical = spec
            .critical
            .unwrap_or_else(|| CRITICAL_BY_NAME.contains(&action.name()));
        Ok(Self {
            action,
            critical,
            priority: spec.priority.unwrap_or(0),
            dependencies: spec.dependencies,
        })
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn build_action(spec: &ToolSpec) -> Result<ToolAction, ToolError> {
    let p = &spec.params;
    match spec.name.as_str() {
        "create_file" => {
            let raw = str_param(p, "path")
                .or_else(|| str_param(p, "name"))
                .ok_or(ToolError::missing("create_file", "path"))?;
            Ok(ToolAction::CreateFile {
                path: normalize_file_path(raw),
                content: str_param(p, "content").unwrap_or_default().to_string(),
            })
        }
        "edit_file" => Ok(ToolAction::EditFile {
            path: str_param(p, "path")
                .ok_or(ToolError::missing("edit_file", "path"))?
                .trim_start_matches('/')
                .to_string(),
            content: str_param(p, "content")
                .ok_or(ToolError::missing("edit_file", "content"))?
                .to_string(),
        }),
        "create_directory" => Ok(ToolAction::CreateDirectory {
            path: str_param(p, "path")
                .ok_or(ToolError::missing("create_directory", "path"))?
                .trim_start_matches('/')
                .to_string(),
        }),
        "run_terminal" => Ok(ToolAction::RunTerminal {
            command: str_param(p, "command")
                .ok_or(ToolError::missing("run_terminal", "command"))?
                .to_string(),
            cwd: str_param(p, "cwd").map(str::to_string),
        }),
        "git_operation" => {
            let operation = GitOp::parse(
                str_param(p, "operation").ok_or(ToolError::missing("git_operation", "operation"))?,
            );
            let commit_message = str_param(p, "commit_message").map(str::to_string);
            if operation == GitOp::Commit && commit_message.is_none() {
                return Err(ToolError::missing("git_operation", "commit_message"));
            }
            Ok(ToolAction::GitOperation {
                operation,
                commit_message,
            })
        }
        "install_dependency" => Ok(ToolAction::InstallDependency {
            command: install_command(p)?,
        }),
        "run_tests" => Ok(ToolAction::RunTests {
            command: test_command(p),
        }),
        "configure_linter" => Ok(ToolAction::ConfigureLinter {
            command: linter_command(p),
        }),
        "search_files" => {
            let pattern =
                str_param(p, "pattern").ok_or(ToolError::missing("search_files", "pattern"))?;
            let path = str_param(p, "path").unwrap_or(".");
            Ok(ToolAction::SearchFiles {
                command: format!("grep -rn {} {}", shell_quote(pattern), shell_quote(path)),
            })
        }
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

/// Leading `/` becomes workspace-relative; a bare extensionless file name
/// (not directory-like) gets a `.js` default extension.
fn normalize_file_path(raw: &str) -> String {
    let path = raw.trim_start_matches('/');
    let last = path.rsplit('/').next().unwrap_or(path);
    let directory_like = path.ends_with('/') || last.is_empty();
    if !directory_like && !last.contains('.') {
        format!("{path}.js")
    } else {
        path.to_string()
    }
}

/// Package-manager command for an install request.  The parameters are
/// language-idiomatic: `language` or `manager` picks the tool, and the
/// packages may arrive as `package`, `packages`, or `dependencies`.
fn install_command(p: &Value) -> Result<String, ToolError> {
    let mut packages: Vec<String> = Vec::new();
    for key in ["package", "packages", "dependencies"] {
        match p.get(key) {
            Some(Value::String(s)) => packages.extend(s.split_whitespace().map(str::to_string)),
            Some(Value::Array(a)) => {
                packages.extend(a.iter().filter_map(Value::as_str).map(str::to_string))
            }
            _ => {}
        }
    }
    if packages.is_empty() {
        return Err(ToolError::missing("install_dependency", "package"));
    }

    let manager = str_param(p, "manager")
        .or_else(|| str_param(p, "language"))
        .unwrap_or("npm");
    let dev = p.get("dev").and_then(Value::as_bool).unwrap_or(false);
    let list = packages.join(" ");

    Ok(match manager {
        "pip" | "python" => format!("pip install {list}"),
        "cargo" | "rust" => format!("cargo add {list}"),
        "gem" | "ruby" => format!("gem install {list}"),
        "go" | "golang" => format!("go get {list}"),
        _ if dev => format!("npm install --save-dev {list}"),
        _ => format!("npm install {list}"),
    })
}

fn test_command(p: &Value) -> String {
    if let Some(cmd) = str_param(p, "command") {
        return cmd.to_string();
    }
    match str_param(p, "framework").or_else(|| str_param(p, "language")) {
        Some("pytest") | Some("python") => "pytest".into(),
        Some("cargo") | Some("rust") => "cargo test".into(),
        Some("go") | Some("golang") => "go test ./...".into(),
        _ => "npm test".into(),
    }
}

fn linter_command(p: &Value) -> String {
    match str_param(p, "linter").or_else(|| str_param(p, "language")) {
        Some("flake8") | Some("python") => "flake8 .".into(),
        Some("clippy") | Some("rust") => "cargo clippy".into(),
        _ => "npx eslint --init".into(),
    }
}

fn shell_quote(s: &str) -> String {
    if s.chars().all(|c| c.is_alphanumeric() || "._-/".contains(c)) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// One entry of the supported-tool listing (`GET /api/tools`).
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

/// The closed tool vocabulary with per-tool parameter requirements.
pub fn vocabulary() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor { name: "create_file", required: &["path"], optional: &["content"] },
        ToolDescriptor { name: "edit_file", required: &["path", "content"], optional: &[] },
        ToolDescriptor { name: "create_directory", required: &["path"], optional: &[] },
        ToolDescriptor { name: "run_terminal", required: &["command"], optional: &["cwd"] },
        ToolDescriptor {
            name: "git_operation",
            required: &["operation"],
            optional: &["commit_message"],
        },
        ToolDescriptor {
            name: "install_dependency",
            required: &["package"],
            optional: &["manager", "dev"],
        },
        ToolDescriptor { name: "run_tests", required: &[], optional: &["framework", "command"] },
        ToolDescriptor { name: "configure_linter", required: &[], optional: &["linter"] },
        ToolDescriptor { name: "search_files", required: &["pattern"], optional: &["path"] },
    ]
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
