// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use olle_tools::ProjectContext;

use crate::template::WorkflowTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initializing,
    Ready,
    Executing,
    Paused,
    /// Never persisted: a critical tool failure moves the workflow
    /// straight to [`Failed`](Self::Failed).  `phase_failed` appears on
    /// the wire only as the status tag of an execute-call outcome.
    PhaseFailed,
    Failed,
    Completed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Executing => "executing",
            Self::Paused => "paused",
            Self::PhaseFailed => "phase_failed",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One phase of a live workflow (instantiated from a template).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub name: String,
    pub description: String,
    pub tools: Vec<String>,
    pub dependencies: Vec<String>,
    pub estimated_time: String,
    pub complexity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseFailure {
    pub phase: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// A stateful execution of a template.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    /// Template id this workflow was instantiated from.
    pub workflow_type: String,
    pub status: WorkflowStatus,
    pub phases: Vec<Phase>,
    pub current_phase: usize,
    pub completed_phases: HashSet<String>,
    pub failed_phases: Vec<PhaseFailure>,
    pub context: ProjectContext,
    pub user_request: String,
    pub start_time: DateTime<Utc>,
    pub current_phase_start: Option<DateTime<Utc>>,
    pub total_execution_time_ms: i64,
    pub errors: Vec<String>,
    /// Set when the workflow reaches a terminal state (drives cleanup).
    pub terminal_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn from_template(
        id: String,
        template: WorkflowTemplate,
        user_request: String,
        context: ProjectContext,
    ) -> Self {
        let phases = template
            .phases
            .into_iter()
            .map(|p| Phase {
                name: p.name,
                description: p.description,
                tools: p.tools,
                dependencies: p.dependencies,
                estimated_time: p.estimated_time,
                complexity: p.complexity,
            })
            .collect();
        Self {
            id,
            workflow_type: template.id,
            status: WorkflowStatus::Ready,
            phases,
            current_phase: 0,
            completed_phases: HashSet::new(),
            failed_phases: Vec::new(),
            context,
            user_request,
            start_time: Utc::now(),
            current_phase_start: None,
            total_execution_time_ms: 0,
            errors: Vec::new(),
            terminal_at: None,
        }
    }

    /// Percentage of phases completed, 0–100.
    pub fn progress(&self) -> u32 {
        if self.phases.is_empty() {
            return 100;
        }
        (self.completed_phases.len() * 100 / self.phases.len()) as u32
    }

    /// Dependencies of the current phase that are not completed yet.
    pub fn unmet_dependencies(&self) -> Vec<String> {
        match self.phases.get(self.current_phase) {
            Some(phase) => phase
                .dependencies
                .iter()
                .filter(|d| !self.completed_phases.contains(*d))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn enter_terminal(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.terminal_at = Some(Utc::now());
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::template_for_request;

    fn workflow(request: &str) -> Workflow {
        Workflow::from_template(
            "workflow_1_abc".into(),
            template_for_request(request, &ProjectContext::default()),
            request.into(),
            ProjectContext::default(),
        )
    }

    #[test]
    fn fresh_workflow_is_ready_at_phase_zero() {
        let w = workflow("create a REST API");
        assert_eq!(w.status, WorkflowStatus::Ready);
        assert_eq!(w.current_phase, 0);
        assert_eq!(w.progress(), 0);
        assert!(w.unmet_dependencies().is_empty());
    }

    #[test]
    fn unmet_dependencies_reports_missing_phases() {
        let mut w = workflow("create a REST API");
        w.current_phase = 1; // api_development depends on project_setup
        assert_eq!(w.unmet_dependencies(), vec!["project_setup"]);
        w.completed_phases.insert("project_setup".into());
        assert!(w.unmet_dependencies().is_empty());
    }

    #[test]
    fn progress_tracks_completed_phases() {
        let mut w = workflow("create a REST API");
        w.completed_phases.insert("project_setup".into());
        assert_eq!(w.progress(), 33);
        w.completed_phases.insert("api_development".into());
        w.completed_phases.insert("testing".into());
        assert_eq!(w.progress(), 100);
    }

    #[test]
    fn terminal_states_are_marked() {
        let mut w = workflow("x");
        assert!(w.terminal_at.is_none());
        w.enter_terminal(WorkflowStatus::Cancelled);
        assert!(w.status.is_terminal());
        assert!(w.terminal_at.is_some());
    }

    #[test]
    fn status_terminality() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert!(!WorkflowStatus::Ready.is_terminal());
        assert!(!WorkflowStatus::PhaseFailed.is_terminal());
        assert!(!WorkflowStatus::Paused.is_terminal());
    }
}
