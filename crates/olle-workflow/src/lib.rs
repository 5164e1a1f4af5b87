// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Multi-phase workflow orchestration.
//!
//! A workflow is a stateful execution of a template: an ordered list of
//! phases, each with declared dependencies and an expected tool mix.
//! Clients advance a workflow one phase at a time with explicit calls; each
//! advance plans tools through the backend and executes them through the
//! tool engine.  Workflows live in memory, are addressable by id for
//! inspection, and are swept away 24 hours after reaching a terminal
//! state.

mod orchestrator;
mod template;
mod workflow;

pub use orchestrator::{Orchestrator, PhaseOutcome, StartedWorkflow, WorkflowError};
pub use template::{builtin_templates, template_for_request, PhaseTemplate, WorkflowTemplate};
pub use workflow::{Phase, PhaseFailure, Workflow, WorkflowStatus};
