// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Workflow surface: start, inspect, advance, pause/resume, cancel,
//! cleanup.  The whole surface is gated by `workflow.enabled`
//! (`ENABLE_AGENTIC_ORCHESTRATION`).

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use olle_tools::ProjectContext;
use olle_workflow::{PhaseOutcome, StartedWorkflow, WorkflowError};

use crate::{error::GatewayError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub user_request: String,
    #[serde(default)]
    pub project_context: ProjectContext,
}

fn ensure_enabled(state: &AppState) -> Result<(), GatewayError> {
    if state.config.workflow.enabled {
        Ok(())
    } else {
        Err(GatewayError::OrchestrationDisabled)
    }
}

pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartedWorkflow>, GatewayError> {
    ensure_enabled(&state)?;
    if request.user_request.trim().is_empty() {
        return Err(GatewayError::BadRequest("'userRequest' is required".into()));
    }
    let started = state
        .orchestrator
        .start_workflow(&request.user_request, request.project_context);
    Ok(Json(started))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, GatewayError> {
    ensure_enabled(&state)?;
    let workflows = state.orchestrator.list();
    Ok(Json(json!({
        "count": workflows.len(),
        "workflows": workflows,
    })))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    ensure_enabled(&state)?;
    let workflow = state
        .orchestrator
        .get(&id)
        .ok_or(WorkflowError::NotFound(id))?;
    Ok(Json(json!({
        "workflow": workflow,
        "progress": workflow.progress(),
    })))
}

pub async fn phases(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    ensure_enabled(&state)?;
    let workflow = state
        .orchestrator
        .get(&id)
        .ok_or(WorkflowError::NotFound(id))?;
    Ok(Json(json!({
        "phases": workflow.phases,
        "currentPhase": workflow.current_phase,
        "completedPhases": workflow.completed_phases,
    })))
}

pub async fn execute(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PhaseOutcome>, GatewayError> {
    ensure_enabled(&state)?;
    let outcome = state.orchestrator.execute_next_phase(&id).await?;
    Ok(Json(outcome))
}

pub async fn pause(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    ensure_enabled(&state)?;
    let status = state.orchestrator.pause(&id)?;
    Ok(Json(json!({ "workflowId": id, "status": status })))
}

pub async fn resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    ensure_enabled(&state)?;
    let status = state.orchestrator.resume(&id)?;
    Ok(Json(json!({ "workflowId": id, "status": status })))
}

/// DELETE cancels: the workflow stays addressable for inspection until the
/// cleanup sweeper removes it.
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    ensure_enabled(&state)?;
    let status = state.orchestrator.cancel(&id)?;
    Ok(Json(json!({ "workflowId": id, "status": status })))
}

pub async fn cleanup(State(state): State<AppState>) -> Result<Json<Value>, GatewayError> {
    ensure_enabled(&state)?;
    let removed = state.orchestrator.cleanup();
    Ok(Json(json!({ "removed": removed })))
}
