//! # Proof Routes
//!
//! Proof presentation request and polling:
//! - POST /v1/proofs/request — request a proof for a session and phase
//! - GET  /v1/proofs/{proof_id} — poll status; terminal success includes
//!   the normalized attribute map

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use credrail_core::ProofId;
use credrail_state::{EnrollmentPhase, ProofExchange};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::orchestration;
use crate::routes::sessions::parse_session_id;
use crate::routes::{ok, SuccessBody};
use crate::state::AppState;

/// Build the proof router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/proofs/request", post(request_proof))
        .route("/v1/proofs/:proof_id", get(get_proof_status))
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request a proof presentation for a session.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestProofBody {
    /// The owning session id.
    pub session_id: String,
    /// The enrollment phase whose credential restrictions apply
    /// (`registration`, `mobilization`, `service`, `discharge`).
    pub phase: String,
    /// Free-form comment shown in the holder's wallet.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Result of a proof request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProofRequestedResponse {
    /// Platform-assigned proof identifier.
    pub proof_id: String,
    /// The owning session id.
    pub session_id: String,
    /// Attribute names requested from the holder.
    pub requested_attributes: Vec<String>,
    /// Out-of-band invitation payload (QR content) for the wallet.
    #[schema(value_type = Object)]
    pub invitation_payload: serde_json::Value,
}

/// Proof exchange status as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProofStatusResponse {
    /// Platform-assigned proof identifier.
    pub proof_id: String,
    /// The owning session id.
    pub session_id: String,
    /// Exchange status (`REQUESTED`, `PENDING`, `DONE`, `VERIFIED`,
    /// `FAILED`).
    pub status: String,
    /// Whether the status is terminal success.
    pub verified: bool,
    /// Normalized attributes, present only at terminal success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
}

impl ProofStatusResponse {
    fn from_exchange(exchange: &ProofExchange) -> Self {
        Self {
            proof_id: exchange.proof_id.to_string(),
            session_id: exchange.session_id.to_string(),
            status: exchange.status.to_string(),
            verified: exchange.is_verified(),
            attributes: exchange
                .is_verified()
                .then(|| exchange.revealed_attributes.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Validate for RequestProofBody {
    fn validate(&self) -> Result<(), String> {
        if self.session_id.trim().is_empty() {
            return Err("session_id must not be empty".into());
        }
        if EnrollmentPhase::parse(&self.phase).is_none() {
            return Err(format!(
                "unknown phase {:?}; expected one of registration, mobilization, \
                 service, discharge",
                self.phase
            ));
        }
        if let Some(comment) = &self.comment {
            if comment.len() > 500 {
                return Err("comment must not exceed 500 characters".into());
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/proofs/request — Request a proof presentation.
///
/// The requested attributes are restricted to the phase's configured
/// credential definition; an unset definition fails before any platform
/// call with a configuration hint.
#[utoipa::path(
    post,
    path = "/v1/proofs/request",
    request_body = RequestProofBody,
    responses(
        (status = 200, description = "Proof requested"),
        (status = 400, description = "Invalid session id or phase"),
        (status = 404, description = "Unknown or expired session"),
        (status = 500, description = "Platform unavailable or misconfigured"),
    ),
    tag = "proofs"
)]
pub(crate) async fn request_proof(
    State(state): State<AppState>,
    body: Result<Json<RequestProofBody>, JsonRejection>,
) -> Result<Json<SuccessBody<ProofRequestedResponse>>, AppError> {
    let req = extract_validated_json(body)?;
    let session_id = parse_session_id(&req.session_id)?;
    // Unknown and expired sessions both read as not-found.
    let _session = state.sessions.get_active(&session_id)?;

    let phase = EnrollmentPhase::parse(&req.phase)
        .ok_or_else(|| AppError::Validation(format!("unknown phase {:?}", req.phase)))?;
    let cred_def_id = state
        .config
        .require_cred_def(
            phase.cred_def_name(),
            phase.cred_def_env_var(),
            phase.cred_def(&state.config.cred_defs),
        )
        .map_err(credrail_client::PlatformError::from)?;

    let attribute_names = phase.requested_attributes();
    let receipt = state
        .platform
        .request_proof(attribute_names, cred_def_id, req.comment)
        .await?;

    let exchange = ProofExchange::new(
        receipt.proof_id.clone(),
        session_id.clone(),
        attribute_names.iter().map(|s| (*s).to_string()).collect(),
    );
    state.proofs.insert(exchange);
    tracing::info!(session = %session_id, proof = %receipt.proof_id, %phase, "proof requested");

    Ok(ok(ProofRequestedResponse {
        proof_id: receipt.proof_id.to_string(),
        session_id: session_id.to_string(),
        requested_attributes: attribute_names.iter().map(|s| (*s).to_string()).collect(),
        invitation_payload: receipt.invitation_payload,
    }))
}

/// GET /v1/proofs/{proof_id} — Poll a proof exchange.
///
/// Polls the platform while the exchange is in flight; terminal exchanges
/// are served from the store. At terminal success the response carries the
/// normalized attribute map.
#[utoipa::path(
    get,
    path = "/v1/proofs/{proof_id}",
    params(("proof_id" = String, Path, description = "Proof id")),
    responses(
        (status = 200, description = "Proof status"),
        (status = 404, description = "Unknown proof"),
        (status = 500, description = "Platform unavailable"),
    ),
    tag = "proofs"
)]
pub(crate) async fn get_proof_status(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<SuccessBody<ProofStatusResponse>>, AppError> {
    let proof_id = ProofId::new(raw);
    let exchange = orchestration::poll_proof(&state, &proof_id).await?;
    Ok(ok(ProofStatusResponse::from_exchange(&exchange)))
}
