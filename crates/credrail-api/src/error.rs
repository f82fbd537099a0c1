//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`. Every
//! failure crossing the API boundary becomes the structured envelope
//! `{"success": false, "error": {"code", "description", "details"?}}` —
//! nothing propagates as an unstructured failure.
//!
//! Status mapping: 400 for caller-fixable input (validation, missing
//! required attributes), 401 for upstream authentication, 404 for unknown
//! sessions/records, 500 for upstream and internal failures. Internal error
//! detail is logged, never returned to clients; upstream misconfiguration
//! adds a deployment hint in `details`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use credrail_client::PlatformError;
use credrail_core::attribute::MissingAttributeError;
use credrail_state::{EnrollmentPhase, SessionError};

/// Structured JSON failure envelope.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false` on this envelope.
    pub success: bool,
    /// The error payload.
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. `VALIDATION_ERROR`).
    pub code: String,
    /// Human-readable description. Names the offending field or attribute
    /// for caller-fixable errors.
    pub description: String,
    /// Additional context, present only where it helps the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that maps to the failure envelope.
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller-supplied input malformed or incomplete (400).
    #[error("validation error: {0}")]
    Validation(String),

    /// Session or record absent or expired (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Normalized proof lacks mandatory identity attributes (400).
    #[error("{0}")]
    MissingRequiredAttributes(MissingAttributeError),

    /// A phase's prerequisite phases are incomplete and strict enforcement
    /// is on (400).
    #[error("{phase} prerequisites incomplete: {}", .missing.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", "))]
    PrerequisitesIncomplete {
        /// The phase that was attempted.
        phase: EnrollmentPhase,
        /// The prerequisite phases not yet complete.
        missing: Vec<EnrollmentPhase>,
    },

    /// Missing or invalid API bearer token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Failure talking to the credential platform (401 or 500).
    #[error("platform error: {0}")]
    Upstream(#[from] PlatformError),

    /// Internal server error (500). Message is logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The HTTP status code and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, String) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR".to_string()),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND".to_string()),
            Self::MissingRequiredAttributes(_) => (
                StatusCode::BAD_REQUEST,
                "MISSING_REQUIRED_ATTRIBUTES".to_string(),
            ),
            Self::PrerequisitesIncomplete { .. } => (
                StatusCode::BAD_REQUEST,
                "PREREQUISITES_INCOMPLETE".to_string(),
            ),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED".to_string()),
            Self::Upstream(e) => {
                let status = match e {
                    PlatformError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.code().to_string())
            }
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
            ),
        }
    }

    /// Extra context for the `details` field.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::MissingRequiredAttributes(e) => {
                Some(serde_json::json!({ "missing": e.missing }))
            }
            Self::PrerequisitesIncomplete { missing, .. } => Some(serde_json::json!({
                "missing_phases": missing
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
            })),
            Self::Upstream(e) if e.is_configuration_hint() => Some(serde_json::json!({
                "hint": "this failure is likely a deployment misconfiguration; \
                         check the organization id and credential-definition ids"
            })),
            Self::Upstream(e) if e.is_retryable() => {
                Some(serde_json::json!({ "retryable": true }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let details = self.details();

        // Never expose internal error messages to clients.
        let description = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Upstream(PlatformError::Unavailable { .. }) => {
                "The credential platform is unreachable; try again shortly".to_string()
            }
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Upstream(_) => tracing::error!(error = %self, "platform error"),
            _ => {}
        }

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code,
                description,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<MissingAttributeError> for AppError {
    fn from(err: MissingAttributeError) -> Self {
        Self::MissingRequiredAttributes(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Expired { session_id } => Self::NotFound(format!(
                "session {session_id} has expired; reconnect the wallet"
            )),
            SessionError::ConnectionMismatch { .. } => Self::Validation(err.to_string()),
        }
    }
}
