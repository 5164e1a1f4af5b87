// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The request-processing pipeline behind `/api/chat` and `/api/generate`:
//! parse → classify → context → select model → whitelist payload.
//!
//! Session resolution is layered on top for chat only ([`prepare_chat`]).
//! Generate is sessionless — a prompt-shaped call carries no conversation
//! to remember, and it must not leave phantom entries in the session
//! store.

use serde_json::{json, Map, Value};
use tracing::debug;

use olle_classify::Classification;
use olle_context::Context;
use olle_session::ChatMessage;

use crate::{error::GatewayError, state::AppState};

/// Optional fields forwarded to the daemon when the client set them.
/// Everything else the client sent stays behind the gateway.
const PASSTHROUGH_KEYS: &[&str] = &["options", "template", "context", "keep_alive"];

/// A parsed inbound request.  Unknown fields are retained in
/// `passthrough` but only whitelisted ones ever reach the upstream call.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub model: String,
    pub messages: Vec<Value>,
    pub prompt: Option<String>,
    pub stream: bool,
    passthrough: Map<String, Value>,
}

impl InboundRequest {
    pub fn parse(body: &Value) -> Result<Self, GatewayError> {
        let obj = body
            .as_object()
            .ok_or_else(|| GatewayError::BadRequest("request body must be a JSON object".into()))?;
        let model = obj
            .get("model")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::BadRequest("'model' is required".into()))?
            .to_string();
        let messages = obj
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let prompt = obj.get("prompt").and_then(Value::as_str).map(str::to_string);
        let stream = obj.get("stream").and_then(Value::as_bool).unwrap_or(true);

        let mut passthrough = Map::new();
        for key in PASSTHROUGH_KEYS {
            if let Some(v) = obj.get(*key) {
                passthrough.insert(key.to_string(), v.clone());
            }
        }

        Ok(Self {
            model,
            messages,
            prompt,
            stream,
            passthrough,
        })
    }

    /// The text classification runs on: the last user-role message, falling
    /// back to the raw prompt.
    pub fn classify_content(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
            .and_then(|m| m.get("content").and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| self.prompt.clone())
            .unwrap_or_default()
    }
}

/// Classification, context, and model resolution — everything chat and
/// generate share.  No session state here.
pub struct Prepared {
    pub request: InboundRequest,
    pub classification: Classification,
    pub context: Context,
    pub selected_model: String,
}

/// [`Prepared`] plus the conversational state that only chat carries.
pub struct ChatPrepared {
    pub prepared: Prepared,
    pub session_id: String,
    /// Session history as it stood when the request arrived.
    pub history: Vec<ChatMessage>,
    /// Session history + the request's own messages, upstream-ready.
    pub merged_messages: Vec<Value>,
}

/// Run classification, context assembly, and model selection for an
/// inbound request.  Used directly by generate; chat goes through
/// [`prepare_chat`].
pub async fn prepare(state: &AppState, body: &Value) -> Result<Prepared, GatewayError> {
    let request = InboundRequest::parse(body)?;

    // Inventory failures degrade selection to the configured default —
    // never fail the request this early.
    let inventory = state.backend.tags().await.unwrap_or_default();

    let content = request.classify_content();
    let classification = state.classifier.classify(&content, &inventory).await;
    let context = state
        .context
        .smart_context(&content, classification.task_type, classification.complexity)
        .await;
    let selected_model =
        state
            .classifier
            .select_model(&request.model, &classification, &inventory);
    debug!(
        requested = %request.model,
        selected = %selected_model,
        task = classification.task_type.as_str(),
        "pipeline resolved model"
    );

    Ok(Prepared {
        request,
        classification,
        context,
        selected_model,
    })
}

/// [`prepare`] plus session resolution and history merging.
pub async fn prepare_chat(
    state: &AppState,
    body: &Value,
    user_agent: &str,
) -> Result<ChatPrepared, GatewayError> {
    let prepared = prepare(state, body).await?;

    let (session_id, history) = state.sessions.get_or_assign(
        user_agent,
        &prepared.request.model,
        prepared.request.messages.len(),
    );

    let mut merged_messages: Vec<Value> = history
        .iter()
        .map(|m| json!({ "role": m.role, "content": m.content }))
        .collect();
    if let Some(system) = context_system_message(&prepared.context) {
        merged_messages.insert(0, system);
    }
    merged_messages.extend(prepared.request.messages.iter().cloned());

    Ok(ChatPrepared {
        prepared,
        session_id,
        history,
        merged_messages,
    })
}

/// Build the upstream chat payload.  Only whitelisted keys are present:
/// `model` (replaced), `messages`, `stream`, and the optional passthrough
/// set.
pub fn whitelist_payload(chat: &ChatPrepared, stream: bool) -> Value {
    let mut payload = Map::new();
    payload.insert(
        "model".into(),
        Value::String(chat.prepared.selected_model.clone()),
    );
    payload.insert("messages".into(), Value::Array(chat.merged_messages.clone()));
    payload.insert("stream".into(), Value::Bool(stream));
    for (k, v) in &chat.prepared.request.passthrough {
        payload.insert(k.clone(), v.clone());
    }
    Value::Object(payload)
}

/// Generate-style payload: `prompt` instead of `messages`.
pub fn whitelist_generate_payload(prepared: &Prepared, stream: bool) -> Value {
    let mut payload = Map::new();
    payload.insert("model".into(), Value::String(prepared.selected_model.clone()));
    payload.insert(
        "prompt".into(),
        Value::String(prepared.request.prompt.clone().unwrap_or_default()),
    );
    payload.insert("stream".into(), Value::Bool(stream));
    for (k, v) in &prepared.request.passthrough {
        payload.insert(k.clone(), v.clone());
    }
    Value::Object(payload)
}

/// Workspace facts rendered as a leading system message; `None` when there
/// is nothing worth attaching.
fn context_system_message(context: &Context) -> Option<Value> {
    if context.files.is_empty() && context.dependencies.is_none() && context.git_status.is_none() {
        return None;
    }
    let mut parts: Vec<String> = Vec::new();
    if !context.files.is_empty() {
        let names: Vec<&str> = context.files.iter().map(|f| f.path.as_str()).collect();
        parts.push(format!("relevant files: {}", names.join(", ")));
    }
    if let Some(deps) = &context.dependencies {
        if !deps.runtime.is_empty() {
            parts.push(format!("dependencies: {}", deps.runtime.join(", ")));
        }
    }
    if let Some(git) = &context.git_status {
        parts.push(format!("{} changed file(s) in git", git.changed_count));
    }
    Some(json!({
        "role": "system",
        "content": format!("Workspace context: {}.", parts.join("; ")),
    }))
}

/// The `_ollamaGeek` side-band attached to non-streaming responses.
pub fn sideband(prepared: &Prepared) -> Value {
    json!({
        "originalModel": prepared.request.model,
        "selectedModel": prepared.selected_model,
        "taskType": prepared.classification.task_type.as_str(),
        "complexity": prepared.classification.complexity.as_str(),
        "reasoning": prepared.classification.reasoning,
    })
}

/// Session history after a completed turn: merged request messages plus
/// the assistant's reply (trimming happens in the store).
pub fn completed_history(
    request: &InboundRequest,
    history: &[ChatMessage],
    assistant: &str,
) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = history.to_vec();
    for m in &request.messages {
        let role = m.get("role").and_then(Value::as_str).unwrap_or("user");
        let content = m.get("content").and_then(Value::as_str).unwrap_or_default();
        messages.push(ChatMessage::new(role, content));
    }
    messages.push(ChatMessage::new("assistant", assistant));
    messages
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound(body: Value) -> InboundRequest {
        InboundRequest::parse(&body).unwrap()
    }

    fn prepared_with(request: InboundRequest, selected: &str) -> Prepared {
        Prepared {
            request,
            classification: default_classification(),
            context: Context::fallback(),
            selected_model: selected.into(),
        }
    }

    #[test]
    fn parse_requires_model() {
        let err = InboundRequest::parse(&json!({ "messages": [] })).unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[test]
    fn stream_defaults_to_true() {
        let r = inbound(json!({ "model": "m", "messages": [] }));
        assert!(r.stream);
        let r = inbound(json!({ "model": "m", "messages": [], "stream": false }));
        assert!(!r.stream);
    }

    #[test]
    fn classify_content_prefers_last_user_message() {
        let r = inbound(json!({
            "model": "m",
            "messages": [
                { "role": "user", "content": "first" },
                { "role": "assistant", "content": "reply" },
                { "role": "user", "content": "second" },
            ],
        }));
        assert_eq!(r.classify_content(), "second");
    }

    #[test]
    fn classify_content_falls_back_to_prompt() {
        let r = inbound(json!({ "model": "m", "prompt": "generate things" }));
        assert_eq!(r.classify_content(), "generate things");
    }

    #[test]
    fn unknown_fields_never_reach_the_payload() {
        let r = inbound(json!({
            "model": "m",
            "messages": [{ "role": "user", "content": "hi" }],
            "options": { "temperature": 0.1 },
            "api_key": "should-not-pass",
            "internal_flag": true,
        }));
        let chat = ChatPrepared {
            merged_messages: r.messages.clone(),
            prepared: prepared_with(r, "picked"),
            session_id: "s".into(),
            history: vec![],
        };
        let payload = whitelist_payload(&chat, true);
        let keys: Vec<&String> = payload.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 4);
        assert!(payload.get("api_key").is_none());
        assert!(payload.get("internal_flag").is_none());
        assert_eq!(payload["model"], "picked");
        assert_eq!(payload["options"]["temperature"], 0.1);
    }

    #[test]
    fn generate_payload_carries_prompt() {
        let r = inbound(json!({ "model": "m", "prompt": "say hi", "keep_alive": "5m" }));
        let prepared = prepared_with(r, "picked");
        let payload = whitelist_generate_payload(&prepared, false);
        assert_eq!(payload["prompt"], "say hi");
        assert_eq!(payload["keep_alive"], "5m");
        assert!(payload.get("messages").is_none());
    }

    #[test]
    fn sideband_reflects_the_classification() {
        let r = inbound(json!({ "model": "orig", "messages": [] }));
        let prepared = prepared_with(r, "new");
        let meta = sideband(&prepared);
        assert_eq!(meta["originalModel"], "orig");
        assert_eq!(meta["selectedModel"], "new");
        assert_eq!(meta["taskType"], "general");
        assert!(!meta["reasoning"].as_str().unwrap().is_empty());
    }

    #[test]
    fn completed_history_appends_turn() {
        let r = inbound(json!({
            "model": "m",
            "messages": [{ "role": "user", "content": "question" }],
        }));
        let history = vec![ChatMessage::new("user", "earlier")];
        let out = completed_history(&r, &history, "answer");
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].content, "earlier");
        assert_eq!(out[1].content, "question");
        assert_eq!(out[2].role, "assistant");
    }

    #[test]
    fn empty_context_adds_no_system_message() {
        assert!(context_system_message(&Context::fallback()).is_none());
    }

    fn default_classification() -> Classification {
        use olle_classify::{Complexity, Language, TaskType};
        Classification {
            task_type: TaskType::General,
            complexity: Complexity::Medium,
            language: Language::General,
            recommended_model: "rec".into(),
            estimated_tokens: 0,
            needs_planning: false,
            planning_steps: vec![],
            reasoning: "defaults".into(),
        }
    }
}
