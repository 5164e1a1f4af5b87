// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! AI tool planning.
//!
//! For each workflow phase the planner asks the backend for a tool list.
//! Models are unreliable emitters: the reply may be clean JSON, JSON inside
//! a markdown fence, or a numbered plain-text plan.  Parsing tries each
//! format in turn and a second, stricter model round before giving up and
//! substituting the deterministic fallback template — a phase always gets
//! *some* plan.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use olle_ollama::Backend;

use crate::{fallback::fallback_tools, Tool, ToolError, ToolSpec};

/// Project descriptor forwarded by the client with a workflow request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectContext {
    pub project_type: Option<String>,
    pub project_name: Option<String>,
    pub target_dir: Option<String>,
}

/// Where a phase's plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Model,
    Fallback,
}

pub struct ToolPlanner {
    backend: Arc<dyn Backend>,
    model: String,
}

impl ToolPlanner {
    pub fn new(backend: Arc<dyn Backend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Plan the tools for one phase.  Never fails: exhausted parsing
    /// substitutes the keyword fallback template.
    pub async fn plan_phase(
        &self,
        phase_name: &str,
        phase_description: &str,
        user_request: &str,
        context: &ProjectContext,
    ) -> (Vec<Tool>, PlanSource) {
        for strict in [false, true] {
            let prompt = self.build_prompt(phase_name, phase_description, user_request, context, strict);
            let reply = match self.ask(&prompt).await {
                Some(r) => r,
                None => break, // backend down; go straight to fallback
            };
            match parse_plan(&reply) {
                Ok(specs) => {
                    let tools = self.contain_and_validate(specs, context);
                    if !tools.is_empty() {
                        return (tools, PlanSource::Model);
                    }
                    warn!(phase = phase_name, "model plan had no usable tools");
                }
                Err(e) => {
                    debug!(phase = phase_name, error = %e, strict, "plan parse failed");
                }
            }
        }

        let tools = self.contain_and_validate(fallback_tools(user_request), context);
        (tools, PlanSource::Fallback)
    }

    fn build_prompt(
        &self,
        phase_name: &str,
        phase_description: &str,
        user_request: &str,
        context: &ProjectContext,
        strict: bool,
    ) -> String {
        let names: Vec<&str> = crate::vocabulary().iter().map(|d| d.name).collect();
        let mut prompt = format!(
            "You are planning the '{phase_name}' phase ({phase_description}) of: {user_request}\n\
             Project type: {}, name: {}\n\
             Available tools: {}\n\
             Reply with a JSON array of tools, each \
             {{\"name\": ..., \"params\": {{...}}, \"priority\": <int>, \"dependencies\": [...]}}.",
            context.project_type.as_deref().unwrap_or("unknown"),
            context.project_name.as_deref().unwrap_or("unnamed"),
            names.join(", "),
        );
        if strict {
            prompt.push_str("\nReply with ONLY the JSON array. No prose, no markdown fences.");
        }
        prompt
    }

    async fn ask(&self, prompt: &str) -> Option<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });
        match self.backend.chat(&body).await {
            Ok(v) => v["message"]["content"].as_str().map(str::to_string),
            Err(e) => {
                warn!(error = %e, "tool planning call failed");
                None
            }
        }
    }

    /// Containment plus validation.  Relative paths get the project-name
    /// prefix; paths that are absolute or climb upward are rejected here
    /// (the engine would refuse them anyway, but a rejected tool should
    /// never reach scheduling).
    fn contain_and_validate(&self, specs: Vec<ToolSpec>, context: &ProjectContext) -> Vec<Tool> {
        let mut tools = Vec::new();
        for spec in specs {
            let spec = match apply_context(spec, context) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "rejected planned tool");
                    continue;
                }
            };
            match Tool::validate(spec) {
                Ok(t) => tools.push(t),
                Err(e) => warn!(error = %e, "dropped invalid planned tool"),
            }
        }
        tools
    }
}

/// Prefix relative paths with the project name and reject escapes.
fn apply_context(mut spec: ToolSpec, context: &ProjectContext) -> Result<ToolSpec, ToolError> {
    let Some(project) = context.project_name.as_deref() else {
        return Ok(spec);
    };
    let Some(params) = spec.params.as_object_mut() else {
        return Ok(spec);
    };

    for key in ["path", "name", "cwd"] {
        let Some(raw) = params.get(key).and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        if raw.split('/').any(|seg| seg == "..") {
            return Err(ToolError::PathEscape(raw));
        }
        if raw.starts_with('/') {
            // Absolute: allowed only under the declared target dir.
            match context.target_dir.as_deref() {
                Some(target) if raw.starts_with(target) => {}
                _ => return Err(ToolError::PathEscape(raw)),
            }
            continue;
        }
        if raw != project && !raw.starts_with(&format!("{project}/")) {
            params.insert(key.to_string(), Value::String(format!("{project}/{raw}")));
        }
    }
    Ok(spec)
}

/// Parse a model reply into tool specs: JSON first, numbered format second.
fn parse_plan(reply: &str) -> Result<Vec<ToolSpec>, ToolError> {
    let stripped = strip_fences(reply);

    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        let entries = match &value {
            Value::Array(a) => a.clone(),
            Value::Object(o) => o
                .get("tools")
                .and_then(Value::as_array)
                .cloned()
                .ok_or_else(|| ToolError::InvalidPlan("JSON object without 'tools'".into()))?,
            _ => return Err(ToolError::InvalidPlan("JSON is not an array or object".into())),
        };
        return entries.iter().map(ToolSpec::from_value).collect();
    }

    parse_numbered(stripped)
}

/// Cut the payload out of a markdown fence if one is present.
fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    // Skip the info string ("json", "javascript", …) up to the newline.
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Numbered plain-text plan:
///
/// ```text
/// 1. Tool: create_file
/// - path: svc/index.js
/// - content: console.log('hi')
/// 2. Tool: run_terminal
/// - command: npm install
/// ```
fn parse_numbered(text: &str) -> Result<Vec<ToolSpec>, ToolError> {
    let mut specs: Vec<ToolSpec> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = header_tool_name(trimmed) {
            specs.push(ToolSpec::new(rest, Value::Object(Default::default())));
            continue;
        }
        if let Some((key, value)) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
            .and_then(|kv| kv.split_once(':'))
        {
            if let Some(spec) = specs.last_mut() {
                if let Some(params) = spec.params.as_object_mut() {
                    params.insert(
                        key.trim().to_string(),
                        Value::String(value.trim().to_string()),
                    );
                }
            }
        }
    }

    if specs.is_empty() {
        return Err(ToolError::InvalidPlan("no numbered tool entries found".into()));
    }
    Ok(specs)
}

/// Match a `N. Tool: <name>` header line.
fn header_tool_name(line: &str) -> Option<&str> {
    let after_number = line.split_once('.').and_then(|(n, rest)| {
        n.trim().parse::<u32>().ok()?;
        Some(rest.trim())
    })?;
    let name = after_number
        .strip_prefix("Tool:")
        .or_else(|| after_number.strip_prefix("tool:"))?
        .trim();
    (!name.is_empty()).then_some(name)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
