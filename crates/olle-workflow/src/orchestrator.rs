// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use olle_tools::{PhaseExecution, ProjectContext, ToolEngine, ToolPlanner, ToolResult};

use crate::{
    template::template_for_request,
    workflow::{Phase, PhaseFailure, Workflow, WorkflowStatus},
};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow not found: {0}")]
    NotFound(String),

    #[error("operation not valid while workflow is {status}")]
    InvalidState { status: &'static str },
}

/// Result of `start_workflow`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedWorkflow {
    pub workflow_id: String,
    pub workflow: Workflow,
    pub next_phase: Option<Phase>,
}

/// Result of one `execute_next_phase` call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PhaseOutcome {
    /// All phases already done; the workflow is now terminal.
    Completed {
        progress: u32,
        total_execution_time_ms: i64,
    },
    /// The current phase's dependencies are not completed yet.
    Waiting { dependencies: Vec<String> },
    /// A critical tool failed; the workflow is now failed.
    PhaseFailed {
        phase: String,
        results: Vec<ToolResult>,
    },
    /// The phase ran to the end; `current_phase` advanced by one.
    PhaseCompleted {
        phase: String,
        progress: u32,
        next_phase: Option<Phase>,
        results: Vec<ToolResult>,
    },
}

/// Owns every live workflow and drives the plan → execute loop.
pub struct Orchestrator {
    workflows: DashMap<String, Workflow>,
    planner: ToolPlanner,
    engine: ToolEngine,
    retention_ms: i64,
}

impl Orchestrator {
    pub fn new(planner: ToolPlanner, engine: ToolEngine, retention_ms: i64) -> Self {
        Self {
            workflows: DashMap::new(),
            planner,
            engine,
            retention_ms,
        }
    }

    fn new_id() -> String {
        let ts = Utc::now().timestamp_millis();
        let suffix: String = rand::thread_rng()
            .sample_iter(rand::distributions::Alphanumeric)
            .take(6)
            .map(|b| (b as char).to_ascii_lowercase())
            .collect();
        format!("workflow_{ts}_{suffix}")
    }

    /// Classify the request into a template and instantiate a workflow.
    pub fn start_workflow(
        &self,
        user_request: &str,
        context: ProjectContext,
    ) -> StartedWorkflow {
        let template = template_for_request(user_request, &context);
        let id = Self::new_id();
        info!(workflow = %id, template = %template.id, "starting workflow");

        let workflow =
            Workflow::from_template(id.clone(), template, user_request.to_string(), context);
        let next_phase = workflow.phases.first().cloned();
        self.workflows.insert(id.clone(), workflow.clone());

        StartedWorkflow {
            workflow_id: id,
            workflow,
            next_phase,
        }
    }

    /// Advance a workflow by at most one phase.
    ///
    /// `current_phase` either stays (waiting / failed) or increments by
    /// exactly one (phase completed); completion of the final phase leaves
    /// the index at `phases.len()` and the next call reports `Completed`.
    pub async fn execute_next_phase(&self, id: &str) -> Result<PhaseOutcome, WorkflowError> {
        // Claim the phase under the map guard, then plan and execute
        // without holding it — planning is a model call and must not block
        // unrelated workflows.
        let (phase, user_request, context) = {
            let mut workflow = self
                .workflows
                .get_mut(id)
                .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;

            if workflow.status.is_terminal() {
                return Err(WorkflowError::InvalidState {
                    status: workflow.status.as_str(),
                });
            }
            match workflow.status {
                WorkflowStatus::Ready | WorkflowStatus::Initializing => {}
                WorkflowStatus::Paused => {
                    return Err(WorkflowError::InvalidState { status: "paused" })
                }
                _ => {
                    return Err(WorkflowError::InvalidState {
                        status: workflow.status.as_str(),
                    })
                }
            }

            if workflow.current_phase >= workflow.phases.len() {
                let total = (Utc::now() - workflow.start_time).num_milliseconds();
                workflow.total_execution_time_ms = total;
                workflow.enter_terminal(WorkflowStatus::Completed);
                info!(workflow = %id, total_ms = total, "workflow completed");
                return Ok(PhaseOutcome::Completed {
                    progress: workflow.progress(),
                    total_execution_time_ms: total,
                });
            }

            let unmet = workflow.unmet_dependencies();
            if !unmet.is_empty() {
                return Ok(PhaseOutcome::Waiting { dependencies: unmet });
            }

            workflow.status = WorkflowStatus::Executing;
            workflow.current_phase_start = Some(Utc::now());
            (
                workflow.phases[workflow.current_phase].clone(),
                workflow.user_request.clone(),
                workflow.context.clone(),
            )
        };

        let (tools, _source) = self
            .planner
            .plan_phase(&phase.name, &phase.description, &user_request, &context)
            .await;
        let execution: PhaseExecution = self.engine.execute_phase(tools).await;

        // Re-acquire and apply the transition.
        let mut workflow = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;

        if let Some(started) = workflow.current_phase_start.take() {
            workflow.total_execution_time_ms += (Utc::now() - started).num_milliseconds();
        }

        if execution.critical_failure {
            let error = execution
                .results
                .iter()
                .filter(|r| !r.success)
                .filter_map(|r| r.error.clone())
                .collect::<Vec<_>>()
                .join("; ");
            warn!(workflow = %id, phase = %phase.name, error = %error, "phase failed");
            workflow.failed_phases.push(PhaseFailure {
                phase: phase.name.clone(),
                error: error.clone(),
                timestamp: Utc::now(),
            });
            workflow.errors.push(error);
            workflow.enter_terminal(WorkflowStatus::Failed);
            return Ok(PhaseOutcome::PhaseFailed {
                phase: phase.name,
                results: execution.results,
            });
        }

        workflow.completed_phases.insert(phase.name.clone());
        workflow.current_phase += 1;
        workflow.status = WorkflowStatus::Ready;
        let next_phase = workflow.phases.get(workflow.current_phase).cloned();
        info!(workflow = %id, phase = %phase.name, "phase completed");

        Ok(PhaseOutcome::PhaseCompleted {
            phase: phase.name,
            progress: workflow.progress(),
            next_phase,
            results: execution.results,
        })
    }

    pub fn pause(&self, id: &str) -> Result<WorkflowStatus, WorkflowError> {
        self.transition(id, WorkflowStatus::Paused, &[WorkflowStatus::Ready])
    }

    pub fn resume(&self, id: &str) -> Result<WorkflowStatus, WorkflowError> {
        self.transition(id, WorkflowStatus::Ready, &[WorkflowStatus::Paused])
    }

    pub fn cancel(&self, id: &str) -> Result<WorkflowStatus, WorkflowError> {
        let mut workflow = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
        if workflow.status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                status: workflow.status.as_str(),
            });
        }
        workflow.enter_terminal(WorkflowStatus::Cancelled);
        Ok(WorkflowStatus::Cancelled)
    }

    fn transition(
        &self,
        id: &str,
        to: WorkflowStatus,
        valid_from: &[WorkflowStatus],
    ) -> Result<WorkflowStatus, WorkflowError> {
        let mut workflow = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;
        if !valid_from.contains(&workflow.status) {
            return Err(WorkflowError::InvalidState {
                status: workflow.status.as_str(),
            });
        }
        workflow.status = to;
        Ok(to)
    }

    pub fn get(&self, id: &str) -> Option<Workflow> {
        self.workflows.get(id).map(|w| w.value().clone())
    }

    pub fn list(&self) -> Vec<Workflow> {
        let mut all: Vec<Workflow> = self.workflows.iter().map(|w| w.value().clone()).collect();
        all.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        all
    }

    /// Remove workflows that have been terminal longer than the retention
    /// window.  Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Utc::now();
        let before = self.workflows.len();
        self.workflows.retain(|_, w| match w.terminal_at {
            Some(t) => (now - t).num_milliseconds() <= self.retention_ms,
            None => true,
        });
        let removed = before - self.workflows.len();
        if removed > 0 {
            info!(removed, "workflow cleanup");
        }
        removed
    }

    /// Periodic cleanup sweeper (hourly).
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                orchestrator.cleanup();
            }
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
