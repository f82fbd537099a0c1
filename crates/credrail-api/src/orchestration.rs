//! # Phase Orchestration
//!
//! The composition layer behind the enrollment endpoints. Each invocation
//! runs one phase of the journey end to end, linearly:
//!
//! 1. Resolve the session (unknown/expired reads as not-found — the holder
//!    must reconnect their wallet).
//! 2. Fetch the proof from the platform; `done` and `verified` both count
//!    as terminal success.
//! 3. Normalize the proof detail into a flat attribute map and validate the
//!    phase's required attributes.
//! 4. Resolve the subject key (derived from the national id, or a
//!    placeholder synthesized from the session) and upsert the workflow
//!    record with the revealed identity fields and the raw proof snapshot.
//! 5. Claim the issuance window for (subject, phase). An already-issued
//!    phase short-circuits into an idempotent response — re-running a
//!    completed phase never issues twice.
//! 6. Check prerequisite phases: warn-and-proceed by default, reject when
//!    strict enforcement is configured.
//! 7. Issue the phase credential over the wallet connection, or
//!    out-of-band by email when no connection is live.
//! 8. Record the phase complete and write through to Postgres when
//!    configured.
//!
//! Every downstream failure is re-wrapped with phase context before it
//! reaches the boundary; the phase progress machine records the failure
//! code in its transition log for diagnostics.

use std::collections::BTreeMap;

use credrail_client::CredentialAttribute;
use credrail_core::{normalize, validate_required, Nin, ProofId, SessionId, SubjectKey};
use credrail_state::{
    EnrollmentPhase, PhaseProgress, PhaseState, ProofStatus, WorkflowPatch, WorkflowStatus,
};

use crate::db;
use crate::error::AppError;
use crate::state::{AppState, ClaimRejected};

/// Outcome of a phase completion, returned to the boundary layer.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    /// The phase that ran.
    pub phase: EnrollmentPhase,
    /// Final orchestrator state (`Issued` on every success path).
    pub state: PhaseState,
    /// The subject the workflow record is keyed on.
    pub subject_key: SubjectKey,
    /// Workflow status after this phase.
    pub workflow_status: WorkflowStatus,
    /// Platform credential id (recorded one on idempotent replays).
    pub credential_id: Option<String>,
    /// Out-of-band invitation URL, when the platform returned one.
    pub invitation_url: Option<String>,
    /// Wallet deep link, when the platform returned one.
    pub deep_link_url: Option<String>,
    /// Whether this call was an idempotent replay of an issued phase.
    pub already_issued: bool,
    /// The normalized attributes extracted from the proof.
    pub attributes: BTreeMap<String, String>,
}

/// Contact details accompanying a phase completion request.
#[derive(Debug, Clone, Default)]
pub struct ContactDetails {
    /// Email for out-of-band issuance and the workflow record.
    pub email: Option<String>,
    /// Phone for the workflow record.
    pub phone: Option<String>,
}

/// Run one enrollment phase: verify the proof, update the workflow record,
/// and issue the phase credential.
pub async fn complete_phase(
    state: &AppState,
    phase: EnrollmentPhase,
    session_id: SessionId,
    proof_id: ProofId,
    contact: ContactDetails,
) -> Result<PhaseOutcome, AppError> {
    let mut progress = PhaseProgress::new(phase);

    let outcome = run_phase(state, phase, &session_id, &proof_id, contact, &mut progress).await;

    if let Err(err) = &outcome {
        let code = error_code(err);
        // Issued phases cannot fail; any other state records the code.
        let _ = progress.failed(code.clone());
        tracing::warn!(
            %phase,
            session = %session_id,
            proof = %proof_id,
            code,
            "phase orchestration failed"
        );
    }
    outcome
}

async fn run_phase(
    state: &AppState,
    phase: EnrollmentPhase,
    session_id: &SessionId,
    proof_id: &ProofId,
    contact: ContactDetails,
    progress: &mut PhaseProgress,
) -> Result<PhaseOutcome, AppError> {
    // 1. Session must exist and be live.
    let session = state.sessions.get_active(session_id)?;

    // The proof must belong to this session's flow.
    let exchange = state
        .proofs
        .get(proof_id)
        .ok_or_else(|| AppError::NotFound(format!("unknown proof {proof_id}")))?;
    if exchange.session_id != *session_id {
        return Err(AppError::Validation(format!(
            "proof {proof_id} does not belong to session {session_id}"
        )));
    }
    progress
        .proof_requested()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    // Fail before the network round-trip when the phase credential is not
    // configured — this is a deployment problem, not a holder problem.
    let cred_def_id = state
        .config
        .require_cred_def(
            phase.cred_def_name(),
            phase.cred_def_env_var(),
            phase.cred_def(&state.config.cred_defs),
        )
        .map_err(credrail_client::PlatformError::from)?
        .to_string();

    // 2. Fetch the proof; both `done` and `verified` are terminal success.
    let detail = state.platform.get_proof(proof_id).await?;
    let status = match ProofStatus::parse(&detail.status) {
        Some(s) if s.is_terminal_success() => s,
        Some(ProofStatus::Failed) => {
            return Err(AppError::Validation(format!(
                "proof {proof_id} failed; the holder must re-present their credentials"
            )));
        }
        Some(s) => {
            return Err(AppError::Validation(format!(
                "proof {proof_id} is not verified yet (status {s}); poll before completing"
            )));
        }
        None => {
            tracing::warn!(proof = %proof_id, status = %detail.status, "unrecognized proof status");
            return Err(AppError::Validation(format!(
                "proof {proof_id} reported an unrecognized status {:?}",
                detail.status
            )));
        }
    };

    // 3. Normalize and validate.
    let attributes = normalize(&detail.raw_detail);
    state.proofs.with_mut(proof_id, |e| {
        if let Err(err) = e.complete(status, attributes.clone()) {
            tracing::warn!(proof = %proof_id, %err, "proof exchange transition rejected");
        }
    });
    validate_required(&attributes, phase.required_attributes())?;
    progress
        .proof_verified()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    // 4. Resolve the subject and upsert the workflow record.
    let subject_key = resolve_subject_key(&attributes, session_id);
    if matches!(
        subject_key.provenance(),
        credrail_core::SubjectKeyProvenance::Derived
    ) && state
        .workflows
        .reconcile_session_placeholder(session_id, &subject_key)
    {
        if let Some(pool) = &state.db_pool {
            let placeholder = SubjectKey::placeholder(session_id);
            if let Err(e) = db::workflows::delete_by_subject(pool, &placeholder).await {
                tracing::warn!(%e, "failed to drop placeholder record from database");
            }
        }
    }

    let patch = WorkflowPatch {
        session_id: Some(session_id.clone()),
        surname: attributes.get("surname").cloned(),
        othernames: attributes.get("othernames").cloned(),
        email: contact.email.clone(),
        phone: contact.phone.clone(),
        proof_data: Some(serde_json::json!({
            (phase.to_string().to_lowercase()): {
                "proof_id": proof_id.as_str(),
                "status": detail.status.clone(),
                "attributes": attributes.clone(),
            }
        })),
    };
    let record = state.workflows.upsert(&subject_key, patch);
    persist(state, &record).await;

    // 5. Idempotency gate on (subject, phase).
    let claim = match state.workflows.claim_issuance(&subject_key, phase) {
        Ok(claim) => claim,
        Err(ClaimRejected::AlreadyIssued(credential_id)) => {
            tracing::info!(
                %phase,
                subject = %subject_key,
                "phase already issued; returning recorded credential"
            );
            return Ok(PhaseOutcome {
                phase,
                state: PhaseState::Issued,
                subject_key: subject_key.clone(),
                workflow_status: record.status,
                credential_id,
                invitation_url: None,
                deep_link_url: None,
                already_issued: true,
                attributes,
            });
        }
        Err(ClaimRejected::InFlight) => {
            return Err(AppError::Validation(format!(
                "{phase} issuance is already in progress for this subject"
            )));
        }
    };

    // 6. Prerequisite policy.
    let missing = record.missing_prerequisites(phase);
    if !missing.is_empty() {
        if state.config.strict_prerequisites {
            return Err(AppError::PrerequisitesIncomplete { phase, missing });
        }
        tracing::warn!(
            %phase,
            subject = %subject_key,
            missing = ?missing.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            "prerequisite phases incomplete; issuing anyway"
        );
    }

    // 7. Issue over the connection, or out-of-band by email.
    let credential_attributes = credential_attributes(phase, &attributes);
    let receipt = match (&session.connection_id, &contact.email) {
        (Some(connection), _) => {
            state
                .platform
                .issue_by_connection(connection.as_str(), &cred_def_id, credential_attributes)
                .await?
        }
        (None, Some(email)) => {
            state
                .platform
                .issue_by_email(email, &cred_def_id, credential_attributes)
                .await?
        }
        (None, None) => {
            return Err(AppError::Validation(
                "session has no wallet connection and no email was provided \
                 for out-of-band issuance"
                    .to_string(),
            ));
        }
    };

    // 8. Record completion and write through.
    let record = state
        .workflows
        .mark_phase_complete(
            claim,
            &subject_key,
            phase,
            Some(receipt.credential_id.clone()),
        )
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if let Some(pool) = &state.db_pool {
        // Conditional flag write first: another process completing the same
        // phase loses the race here instead of silently overwriting.
        let issued = db::workflows::mark_phase_issued(
            pool,
            &subject_key,
            phase,
            Some(receipt.credential_id.as_str()),
        )
        .await;
        match issued {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                %phase,
                subject = %subject_key,
                "phase was already marked issued in the database"
            ),
            Err(e) => tracing::warn!(%e, "failed to mark phase issued in the database"),
        }
    }
    persist(state, &record).await;

    progress
        .issued()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    tracing::info!(
        %phase,
        subject = %subject_key,
        credential = %receipt.credential_id,
        "phase credential issued"
    );

    Ok(PhaseOutcome {
        phase,
        state: progress.state,
        subject_key,
        workflow_status: record.status,
        credential_id: Some(receipt.credential_id),
        invitation_url: receipt.invitation_url,
        deep_link_url: receipt.deep_link_url,
        already_issued: false,
        attributes,
    })
}

/// Derive the subject key from the national id, falling back to a session
/// placeholder when the id is absent or malformed.
fn resolve_subject_key(
    attributes: &BTreeMap<String, String>,
    session_id: &SessionId,
) -> SubjectKey {
    match attributes.get("national_id_number").and_then(|v| Nin::new(v)) {
        Some(nin) => SubjectKey::from_nin(&nin),
        None => {
            tracing::warn!(
                session = %session_id,
                "no usable national id in proof; synthesizing placeholder subject key"
            );
            SubjectKey::placeholder(session_id)
        }
    }
}

/// Assemble the attribute values for the phase credential offer.
///
/// Values the proof did not reveal go out empty here; the issuance gateway
/// substitutes the configured default before the wire.
fn credential_attributes(
    phase: EnrollmentPhase,
    attributes: &BTreeMap<String, String>,
) -> Vec<CredentialAttribute> {
    let get = |name: &str| attributes.get(name).cloned().unwrap_or_default();
    vec![
        CredentialAttribute::new("surname", get("surname")),
        CredentialAttribute::new("othernames", get("othernames")),
        CredentialAttribute::new("national_id_number", get("national_id_number")),
        CredentialAttribute::new("enrollment_phase", phase.to_string()),
        CredentialAttribute::new(
            "issued_date",
            chrono::Utc::now().format("%Y-%m-%d").to_string(),
        ),
    ]
}

/// Poll a proof exchange and fold the result into the store.
///
/// Used by the proof status endpoint; terminal success normalizes and
/// records the revealed attributes so later phase completions and the
/// client's own polling see a consistent view.
pub async fn poll_proof(
    state: &AppState,
    proof_id: &ProofId,
) -> Result<credrail_state::ProofExchange, AppError> {
    let exchange = state
        .proofs
        .get(proof_id)
        .ok_or_else(|| AppError::NotFound(format!("unknown proof {proof_id}")))?;

    // Terminal exchanges are served from the store; the platform exchange
    // is finished and repolling it buys nothing.
    if exchange.status.is_terminal() {
        return Ok(exchange);
    }

    let detail = state.platform.get_proof(proof_id).await?;
    let updated = match ProofStatus::parse(&detail.status) {
        Some(status) if status.is_terminal_success() => {
            let attributes = normalize(&detail.raw_detail);
            state.proofs.with_mut(proof_id, |e| {
                if let Err(err) = e.complete(status, attributes) {
                    tracing::warn!(proof = %proof_id, %err, "proof completion rejected");
                }
                e.clone()
            })
        }
        Some(status) => state.proofs.with_mut(proof_id, |e| {
            if let Err(err) = e.update_status(status) {
                tracing::warn!(proof = %proof_id, %err, "proof status update rejected");
            }
            e.clone()
        }),
        None => {
            tracing::warn!(proof = %proof_id, status = %detail.status, "unrecognized proof status");
            Some(exchange)
        }
    };

    updated.ok_or_else(|| AppError::NotFound(format!("unknown proof {proof_id}")))
}

/// Write a record through to Postgres when persistence is configured.
///
/// Persistence failures are logged, not surfaced: the in-memory store is
/// the source of truth and the demo keeps working through a database
/// outage.
async fn persist(state: &AppState, record: &credrail_state::WorkflowRecord) {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = db::workflows::save(pool, record).await {
            tracing::warn!(subject = %record.subject_key, %e, "failed to persist workflow record");
        }
    }
}

fn error_code(err: &AppError) -> String {
    match err {
        AppError::Validation(_) => "VALIDATION_ERROR".to_string(),
        AppError::NotFound(_) => "NOT_FOUND".to_string(),
        AppError::MissingRequiredAttributes(_) => "MISSING_REQUIRED_ATTRIBUTES".to_string(),
        AppError::PrerequisitesIncomplete { .. } => "PREREQUISITES_INCOMPLETE".to_string(),
        AppError::Unauthorized(_) => "UNAUTHORIZED".to_string(),
        AppError::Upstream(e) => e.code().to_string(),
        AppError::Internal(_) => "INTERNAL_ERROR".to_string(),
    }
}
