// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Failure taxonomy for backend calls.
///
/// The mapping from HTTP status / transport condition to variant is fixed:
/// 400 → [`BadRequest`], 404 → [`ModelNotFound`], 5xx → [`UpstreamFailure`],
/// connection refused → [`BackendUnavailable`], timeout →
/// [`BackendTimeout`], anything else → [`Transport`].
///
/// [`BadRequest`]: BackendError::BadRequest
/// [`ModelNotFound`]: BackendError::ModelNotFound
/// [`UpstreamFailure`]: BackendError::UpstreamFailure
/// [`BackendUnavailable`]: BackendError::BackendUnavailable
/// [`BackendTimeout`]: BackendError::BackendTimeout
/// [`Transport`]: BackendError::Transport
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend rejected request: {0}")]
    BadRequest(String),

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("backend failure ({status}): {body}")]
    UpstreamFailure { status: u16, body: String },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend timed out")]
    BackendTimeout,

    #[error("transport failure: {0}")]
    Transport(String),
}

impl BackendError {
    /// Classify a non-success HTTP response.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => Self::BadRequest(body),
            404 => Self::ModelNotFound(body),
            s if s >= 500 => Self::UpstreamFailure { status: s, body },
            s => Self::Transport(format!("unexpected status {s}: {body}")),
        }
    }

    /// HTTP status the gateway should report for this failure.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::ModelNotFound(_) => 404,
            Self::UpstreamFailure { .. } => 502,
            Self::BackendUnavailable(_) => 502,
            Self::BackendTimeout => 504,
            Self::Transport(_) => 502,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::BackendTimeout
        } else if e.is_connect() {
            Self::BackendUnavailable(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
