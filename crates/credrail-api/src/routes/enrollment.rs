//! # Enrollment Routes
//!
//! The phase orchestration surface:
//! - POST /v1/enrollment/{phase}/complete — verify the phase's proof,
//!   update the workflow record, and issue the phase credential
//! - GET  /v1/enrollment/records/{subject} — workflow record by national
//!   id or session id

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use credrail_core::{Nin, ProofId, SessionId};
use credrail_state::workflow::PhaseCompletion;
use credrail_state::{EnrollmentPhase, WorkflowRecord};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::orchestration::{self, ContactDetails, PhaseOutcome};
use crate::routes::sessions::parse_session_id;
use crate::routes::{ok, SuccessBody};
use crate::state::AppState;

/// Build the enrollment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/enrollment/:phase/complete", post(complete_phase))
        .route("/v1/enrollment/records/:subject", get(get_record))
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request to complete an enrollment phase.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CompletePhaseRequest {
    /// The owning session id.
    pub session_id: String,
    /// The proof exchange to consume.
    pub proof_id: String,
    /// Email for out-of-band issuance when no wallet connection is live.
    #[serde(default)]
    pub email: Option<String>,
    /// Contact phone recorded on the workflow record.
    #[serde(default)]
    pub phone: Option<String>,
}

/// Result of a phase completion.
#[derive(Debug, Serialize, ToSchema)]
pub struct PhaseOutcomeResponse {
    /// The phase that ran.
    pub phase: String,
    /// Final orchestrator state.
    pub state: String,
    /// The subject key of the workflow record.
    pub subject_key: String,
    /// Workflow status after this phase.
    pub workflow_status: String,
    /// Platform credential id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    /// Out-of-band invitation URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_url: Option<String>,
    /// Wallet deep link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_link_url: Option<String>,
    /// Whether this was an idempotent replay of an issued phase.
    pub already_issued: bool,
    /// The normalized attributes extracted from the proof.
    pub attributes: BTreeMap<String, String>,
}

impl PhaseOutcomeResponse {
    fn from_outcome(outcome: PhaseOutcome) -> Self {
        Self {
            phase: outcome.phase.to_string(),
            state: outcome.state.to_string(),
            subject_key: outcome.subject_key.to_string(),
            workflow_status: outcome.workflow_status.to_string(),
            credential_id: outcome.credential_id,
            invitation_url: outcome.invitation_url,
            deep_link_url: outcome.deep_link_url,
            already_issued: outcome.already_issued,
            attributes: outcome.attributes,
        }
    }
}

/// One phase's completion state within a record response.
#[derive(Debug, Serialize, ToSchema)]
pub struct PhaseCompletionResponse {
    /// Whether the phase credential was issued.
    pub issued: bool,
    /// Issuance timestamp (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    /// Platform credential id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
}

impl PhaseCompletionResponse {
    fn from_completion(completion: &PhaseCompletion) -> Self {
        Self {
            issued: completion.issued,
            issued_at: completion.issued_at.map(|t| t.to_rfc3339()),
            credential_id: completion.credential_id.clone(),
        }
    }
}

/// A workflow record as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct WorkflowRecordResponse {
    /// Stable subject key.
    pub subject_key: String,
    /// The session that last touched the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Holder surname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    /// Holder other names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub othernames: Option<String>,
    /// Holder contact email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Holder contact phone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Furthest completed phase.
    pub status: String,
    /// Registration phase completion.
    pub registration: PhaseCompletionResponse,
    /// Mobilization phase completion.
    pub mobilization: PhaseCompletionResponse,
    /// Service phase completion.
    pub service: PhaseCompletionResponse,
    /// Discharge phase completion.
    pub discharge: PhaseCompletionResponse,
    /// Raw proof payloads merged across phases (audit).
    #[schema(value_type = Object)]
    pub proof_data: serde_json::Value,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last mutation timestamp (RFC 3339).
    pub updated_at: String,
}

impl WorkflowRecordResponse {
    fn from_record(record: &WorkflowRecord) -> Self {
        Self {
            subject_key: record.subject_key.to_string(),
            session_id: record.session_id.as_ref().map(|s| s.to_string()),
            surname: record.surname.clone(),
            othernames: record.othernames.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            status: record.status.to_string(),
            registration: PhaseCompletionResponse::from_completion(&record.registration),
            mobilization: PhaseCompletionResponse::from_completion(&record.mobilization),
            service: PhaseCompletionResponse::from_completion(&record.service),
            discharge: PhaseCompletionResponse::from_completion(&record.discharge),
            proof_data: record.proof_data.clone(),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Validate for CompletePhaseRequest {
    fn validate(&self) -> Result<(), String> {
        if self.session_id.trim().is_empty() {
            return Err("session_id must not be empty".into());
        }
        if self.proof_id.trim().is_empty() {
            return Err("proof_id must not be empty".into());
        }
        if let Some(email) = &self.email {
            if !email.contains('@') || email.trim().is_empty() {
                return Err(format!("invalid email address: {email:?}"));
            }
        }
        if let Some(phone) = &self.phone {
            if phone.trim().is_empty() {
                return Err("phone must not be empty when provided".into());
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/enrollment/{phase}/complete — Run one enrollment phase.
///
/// Consumes a verified proof, updates the subject's workflow record, and
/// issues the phase credential. Idempotent per (subject, phase): replaying
/// a completed phase returns the recorded credential without re-issuing.
#[utoipa::path(
    post,
    path = "/v1/enrollment/{phase}/complete",
    params(("phase" = String, Path, description = "Enrollment phase")),
    request_body = CompletePhaseRequest,
    responses(
        (status = 200, description = "Phase completed (or idempotent replay)"),
        (status = 400, description = "Validation failure or missing required attributes"),
        (status = 401, description = "Platform authentication failure"),
        (status = 404, description = "Unknown session or proof"),
        (status = 500, description = "Platform unavailable or misconfigured"),
    ),
    tag = "enrollment"
)]
pub(crate) async fn complete_phase(
    State(state): State<AppState>,
    Path(raw_phase): Path<String>,
    body: Result<Json<CompletePhaseRequest>, JsonRejection>,
) -> Result<Json<SuccessBody<PhaseOutcomeResponse>>, AppError> {
    let phase = EnrollmentPhase::parse(&raw_phase)
        .ok_or_else(|| AppError::Validation(format!("unknown phase {raw_phase:?}")))?;
    let req = extract_validated_json(body)?;
    let session_id = parse_session_id(&req.session_id)?;

    let outcome = orchestration::complete_phase(
        &state,
        phase,
        session_id,
        ProofId::new(req.proof_id),
        ContactDetails {
            email: req.email,
            phone: req.phone,
        },
    )
    .await?;

    Ok(ok(PhaseOutcomeResponse::from_outcome(outcome)))
}

/// GET /v1/enrollment/records/{subject} — Look up a workflow record.
///
/// `subject` is either an 11-digit national id or a session id.
#[utoipa::path(
    get,
    path = "/v1/enrollment/records/{subject}",
    params(("subject" = String, Path, description = "National id or session id")),
    responses(
        (status = 200, description = "Workflow record"),
        (status = 400, description = "Unintelligible subject"),
        (status = 404, description = "No record for subject"),
    ),
    tag = "enrollment"
)]
pub(crate) async fn get_record(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Result<Json<SuccessBody<WorkflowRecordResponse>>, AppError> {
    let record = if let Some(nin) = Nin::new(&subject) {
        state.workflows.find_by_nin(&nin)
    } else if let Some(session_id) = SessionId::parse(&subject) {
        state.workflows.find_by_session(&session_id)
    } else {
        return Err(AppError::Validation(format!(
            "subject {subject:?} is neither an 11-digit national id nor a session id"
        )));
    };

    let record = record
        .ok_or_else(|| AppError::NotFound(format!("no workflow record for subject {subject:?}")))?;
    Ok(ok(WorkflowRecordResponse::from_record(&record)))
}
