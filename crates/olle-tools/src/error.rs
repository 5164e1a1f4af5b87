// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{tool}' is missing required parameter '{param}'")]
    MissingParam { tool: &'static str, param: &'static str },

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("write failed for {path}: {source}")]
    WriteFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("path escapes the workspace: {0}")]
    PathEscape(String),

    #[error("could not parse a tool plan: {0}")]
    InvalidPlan(String),
}

impl ToolError {
    pub(crate) fn missing(tool: &'static str, param: &'static str) -> Self {
        Self::MissingParam { tool, param }
    }
}
