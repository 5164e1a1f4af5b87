// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `/api/chat/unified`: one endpoint, four response shapes.
//!
//! A free-form prompt is classified as simple chat, a planning request, or
//! an execution request (simple or complex).  Chat and planning are
//! answered by the model; execution requests come back as a synthesized
//! tool list.  Complex executions carry `requiresApproval: true` and are
//! never executed as a side effect — the client runs an approved plan
//! through the workflow surface explicitly.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use olle_tools::{ProjectContext, ToolPlanner};

use crate::{error::GatewayError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct UnifiedRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: ProjectContext,
}

/// The auxiliary intent classification driving dispatch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentClassification {
    pub intent: String,
    pub confidence: f64,
    pub complexity: String,
    pub approach: String,
    pub requires_approval: bool,
    pub action_type: String,
}

impl Default for IntentClassification {
    fn default() -> Self {
        Self {
            intent: "chat".into(),
            confidence: 0.5,
            complexity: "low".into(),
            approach: "direct".into(),
            requires_approval: false,
            action_type: "simple_chat".into(),
        }
    }
}

pub async fn unified(
    State(state): State<AppState>,
    Json(request): Json<UnifiedRequest>,
) -> Result<Json<Value>, GatewayError> {
    if request.prompt.trim().is_empty() {
        return Err(GatewayError::BadRequest("'prompt' is required".into()));
    }

    let intent = classify_intent(&state, &request.prompt).await;
    debug!(action = %intent.action_type, confidence = intent.confidence, "unified dispatch");

    match intent.action_type.as_str() {
        "execution_simple" | "execution_complex" => {
            let complex = intent.action_type == "execution_complex";
            let tools = plan_tools(&state, &request).await;
            Ok(Json(json!({
                "type": "execution_task",
                "actionType": intent.action_type,
                "message": format!(
                    "Prepared {} tool action(s) for: {}",
                    tools.len(),
                    request.prompt
                ),
                "tools": tools,
                "requiresApproval": complex,
            })))
        }
        "planning" | "planning_task" => {
            let plan = model_reply(
                &state,
                &format!(
                    "Produce a concise step-by-step plan (no tool calls, no code) for: {}",
                    request.prompt
                ),
            )
            .await?;
            Ok(Json(json!({
                "type": "planning_task",
                "message": "Here is a plan for your request.",
                "plan": plan,
            })))
        }
        _ => {
            let message = model_reply(&state, &request.prompt).await?;
            Ok(Json(json!({
                "type": "simple_chat",
                "message": message,
            })))
        }
    }
}

/// `/api/plan/enhanced`: plan-only variant returning the tool list inside
/// a plan envelope.
pub async fn enhanced_plan(
    State(state): State<AppState>,
    Json(request): Json<UnifiedRequest>,
) -> Result<Json<Value>, GatewayError> {
    if request.prompt.trim().is_empty() {
        return Err(GatewayError::BadRequest("'prompt' is required".into()));
    }
    let tools = plan_tools(&state, &request).await;
    Ok(Json(json!({
        "success": true,
        "plan": {
            "description": request.prompt,
            "tools": tools,
            "context": request.context,
        }
    })))
}

/// Ask the backend to classify the prompt; fall back to keyword heuristics
/// when the reply is unusable or the backend is down.
async fn classify_intent(state: &AppState, prompt: &str) -> IntentClassification {
    let instruction = format!(
        "Classify this user request:\n{prompt}\n\n\
         Reply with ONLY a JSON object:\n\
         {{\"intent\": <string>, \"confidence\": <0..1>, \"complexity\": \
         \"low\"|\"medium\"|\"high\", \"approach\": <string>, \
         \"requiresApproval\": <bool>, \"actionType\": \"simple_chat\"|\
         \"planning\"|\"execution_simple\"|\"execution_complex\"}}"
    );

    if let Ok(reply) = model_reply(state, &instruction).await {
        let stripped = strip_json_fences(&reply);
        if let Ok(parsed) = serde_json::from_str::<IntentClassification>(stripped) {
            if !parsed.action_type.is_empty() {
                return parsed;
            }
        }
        debug!("intent reply unusable; using keyword heuristics");
    }
    heuristic_intent(prompt)
}

/// Keyword dispatch used when the model cannot be consulted.
fn heuristic_intent(prompt: &str) -> IntentClassification {
    let lower = prompt.trim().to_lowercase();

    let execution_verbs =
        ["create", "make", "generate", "write", "run", "install", "set up", "setup", "add"];
    let starts_execution = execution_verbs.iter().any(|v| lower.starts_with(v));

    if starts_execution {
        let complex = ["project", "app", "application", "server", "api"]
            .iter()
            .any(|k| lower.contains(k))
            || lower.contains(" and ")
            || lower.contains(" then ");
        return IntentClassification {
            intent: "execution".into(),
            confidence: 0.7,
            complexity: if complex { "high".into() } else { "low".into() },
            approach: "tools".into(),
            requires_approval: complex,
            action_type: if complex {
                "execution_complex".into()
            } else {
                "execution_simple".into()
            },
        };
    }

    if ["plan", "design", "how should i", "architecture", "strategy"]
        .iter()
        .any(|k| lower.contains(k))
    {
        return IntentClassification {
            intent: "planning".into(),
            confidence: 0.6,
            complexity: "medium".into(),
            approach: "plan".into(),
            requires_approval: false,
            action_type: "planning".into(),
        };
    }

    IntentClassification::default()
}

/// One unary model round with the default model.
async fn model_reply(state: &AppState, prompt: &str) -> Result<String, GatewayError> {
    let body = json!({
        "model": state.config.backend.default_model,
        "messages": [{ "role": "user", "content": prompt }],
        "stream": false,
    });
    let value = state.backend.chat(&body).await?;
    Ok(value["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string())
}

/// Synthesize the tool list for an execution request.
async fn plan_tools(state: &AppState, request: &UnifiedRequest) -> Vec<Value> {
    let planner = ToolPlanner::new(
        state.backend.clone(),
        state.config.backend.default_model.clone(),
    );
    let (tools, source) = planner
        .plan_phase(
            "execution",
            "carry out the user's request",
            &request.prompt,
            &request.context,
        )
        .await;
    debug!(count = tools.len(), source = ?source, "unified tool plan");
    tools.iter().map(|t| t.wire()).collect()
}

fn strip_json_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_create_request_is_simple_execution() {
        let i = heuristic_intent("create a file called notes.txt");
        assert_eq!(i.action_type, "execution_simple");
        assert!(!i.requires_approval);
    }

    #[test]
    fn project_scale_request_is_complex_execution() {
        let i = heuristic_intent("create a node api server with tests");
        assert_eq!(i.action_type, "execution_complex");
        assert!(i.requires_approval);
    }

    #[test]
    fn planning_words_route_to_planning() {
        let i = heuristic_intent("how should I design the architecture?");
        assert_eq!(i.action_type, "planning");
    }

    #[test]
    fn questions_default_to_simple_chat() {
        let i = heuristic_intent("what is a monad?");
        assert_eq!(i.action_type, "simple_chat");
    }

    #[test]
    fn intent_json_parses_with_wire_names() {
        let parsed: IntentClassification = serde_json::from_str(
            r#"{"intent":"execution","confidence":0.9,"complexity":"low",
                "approach":"tools","requiresApproval":false,
                "actionType":"execution_simple"}"#,
        )
        .unwrap();
        assert_eq!(parsed.action_type, "execution_simple");
        assert!(!parsed.requires_approval);
    }

    #[test]
    fn fenced_json_is_stripped() {
        let reply = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_json_fences(reply), "{\"a\":1}");
    }
}
