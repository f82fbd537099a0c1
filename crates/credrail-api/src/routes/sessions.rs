//! # Session Routes
//!
//! Wallet connection session lifecycle:
//! - POST /v1/sessions — create a session for a verifier/issuer flow
//! - GET  /v1/sessions/{session_id} — session status
//! - POST /v1/sessions/{session_id}/connection — platform connection
//!   callback attaching the wallet connection id (idempotent)

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use credrail_core::{ConnectionId, SessionId};
use credrail_state::ConnectionSession;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::{ok, SuccessBody};
use crate::state::AppState;

/// Build the session router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:session_id", get(get_session))
        .route("/v1/sessions/:session_id/connection", post(attach_connection))
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request to create a connection session.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    /// Session lifetime in seconds (default 3600, max 86400).
    #[serde(default)]
    pub ttl_secs: Option<i64>,
}

/// Request to attach a wallet connection to a session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AttachConnectionRequest {
    /// Platform-assigned connection id.
    pub connection_id: String,
}

/// Session state as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// The session identifier.
    pub session_id: String,
    /// Lifecycle status (`PENDING`, `CONNECTED`, `EXPIRED`).
    pub status: String,
    /// The wallet connection id, once connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Expiry timestamp (RFC 3339).
    pub expires_at: String,
}

impl SessionResponse {
    fn from_session(session: &ConnectionSession) -> Self {
        Self {
            session_id: session.session_id.to_string(),
            status: session.status.to_string(),
            connection_id: session.connection_id.as_ref().map(|c| c.to_string()),
            created_at: session.created_at.to_rfc3339(),
            expires_at: session.expires_at.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Validate for CreateSessionRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(ttl) = self.ttl_secs {
            if ttl <= 0 {
                return Err("ttl_secs must be positive".into());
            }
            if ttl > 86_400 {
                return Err("ttl_secs must not exceed 86400".into());
            }
        }
        Ok(())
    }
}

impl Validate for AttachConnectionRequest {
    fn validate(&self) -> Result<(), String> {
        if self.connection_id.trim().is_empty() {
            return Err("connection_id must not be empty".into());
        }
        if self.connection_id.len() > 256 {
            return Err("connection_id must not exceed 256 characters".into());
        }
        Ok(())
    }
}

/// Parse a session id path segment.
pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, AppError> {
    SessionId::parse(raw)
        .ok_or_else(|| AppError::Validation(format!("invalid session id: {raw:?}")))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/sessions — Create a connection session.
#[utoipa::path(
    post,
    path = "/v1/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session created"),
        (status = 400, description = "Invalid ttl"),
    ),
    tag = "sessions"
)]
pub(crate) async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<Json<SuccessBody<SessionResponse>>, AppError> {
    // The body is optional: a request without a JSON body gets the
    // defaults, but a malformed body is still a validation error.
    let req = match body {
        Ok(Json(req)) => {
            req.validate().map_err(AppError::Validation)?;
            req
        }
        Err(JsonRejection::MissingJsonContentType(_)) => CreateSessionRequest::default(),
        Err(e) => return Err(AppError::Validation(format!("invalid JSON body: {e}"))),
    };

    let session = state.sessions.create(req.ttl_secs);
    tracing::info!(session = %session.session_id, "session created");
    Ok(ok(SessionResponse::from_session(&session)))
}

/// GET /v1/sessions/{session_id} — Session status.
#[utoipa::path(
    get,
    path = "/v1/sessions/{session_id}",
    params(("session_id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session state"),
        (status = 404, description = "Unknown session"),
    ),
    tag = "sessions"
)]
pub(crate) async fn get_session(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<SuccessBody<SessionResponse>>, AppError> {
    let session_id = parse_session_id(&raw)?;
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| AppError::NotFound(format!("unknown session {session_id}")))?;
    Ok(ok(SessionResponse::from_session(&session)))
}

/// POST /v1/sessions/{session_id}/connection — Attach a wallet connection.
///
/// Called by the platform's connection webhook. Idempotent for the same
/// connection id; a different id is rejected.
#[utoipa::path(
    post,
    path = "/v1/sessions/{session_id}/connection",
    params(("session_id" = String, Path, description = "Session id")),
    request_body = AttachConnectionRequest,
    responses(
        (status = 200, description = "Connection attached"),
        (status = 400, description = "Conflicting connection id"),
        (status = 404, description = "Unknown session"),
    ),
    tag = "sessions"
)]
pub(crate) async fn attach_connection(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Result<Json<AttachConnectionRequest>, JsonRejection>,
) -> Result<Json<SuccessBody<SessionResponse>>, AppError> {
    let session_id = parse_session_id(&raw)?;
    let req = extract_validated_json(body)?;

    let result = state
        .sessions
        .attach(&session_id, ConnectionId::new(req.connection_id))
        .ok_or_else(|| AppError::NotFound(format!("unknown session {session_id}")))?;
    let session = result?;
    tracing::info!(session = %session_id, "wallet connection attached");
    Ok(ok(SessionResponse::from_session(&session)))
}
