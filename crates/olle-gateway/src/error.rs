// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Error envelope for the HTTP surface.
//!
//! Every failing route produces the same JSON shape:
//!
//! ```json
//! { "error": { "message", "status", "timestamp", "path", "method" } }
//! ```
//!
//! Handlers return [`GatewayError`]; its `IntoResponse` carries the public
//! message in a response extension, and [`error_envelope`] — mounted as
//! outermost middleware so it sees every response — fills in the path and
//! method it captured from the request.  Internal 500 details are masked in
//! production mode; the cause stays in the logs.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use olle_ollama::BackendError;
use olle_workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("workflow surface is disabled")]
    OrchestrationDisabled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Backend(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Workflow(WorkflowError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Workflow(WorkflowError::InvalidState { .. }) => StatusCode::BAD_REQUEST,
            Self::OrchestrationDisabled => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Public error text carried from the handler to the envelope middleware.
#[derive(Debug, Clone)]
pub(crate) struct ErrorMessage(pub String);

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "internal error");
        }
        let mut response = status.into_response();
        response.extensions_mut().insert(ErrorMessage(self.to_string()));
        response
    }
}

/// Envelope middleware.  `production` masks 500 messages.
pub async fn error_envelope(
    State(production): State<bool>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    let status = response.status();

    let message = match response.extensions().get::<ErrorMessage>() {
        Some(ErrorMessage(m)) => m.clone(),
        // Errors produced outside handlers (404 route miss, body rejects)
        // still get the envelope.
        None if status.is_client_error() || status.is_server_error() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        None => return response,
    };

    let message = if status == StatusCode::INTERNAL_SERVER_ERROR && production {
        "Internal Server Error".to_string()
    } else {
        message
    };

    let body = json!({
        "error": {
            "message": message,
            "status": status.as_u16(),
            "timestamp": Utc::now().to_rfc3339(),
            "path": path,
            "method": method,
        }
    });
    (status, Json(body)).into_response()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
