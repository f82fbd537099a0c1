//! # Workflow Record
//!
//! The durable, per-subject record of a multi-phase enrollment journey.
//! This is the only entity that outlives a browser session: sessions and
//! proof exchanges are ephemeral, the workflow record accumulates.
//!
//! ## Invariants
//!
//! - Phase completion flags are monotonic. Once a phase is recorded issued
//!   it stays issued; the only path that clears flags is the explicit
//!   demo-data reset.
//! - A derived subject key, once established, is immutable. A placeholder
//!   key (no national id known yet) may be reconciled to a derived key
//!   exactly once — a best-effort demo affordance, not a consistent merge.
//! - Identity fields are filled from whichever phase reveals them; a later
//!   patch with a value wins over an earlier one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use credrail_core::{SessionId, SubjectKey, SubjectKeyProvenance};

use crate::phase::EnrollmentPhase;

// ─── Workflow Status ─────────────────────────────────────────────────

/// Summary of the furthest completed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// No phase completed yet.
    Pending,
    /// Registration credential issued.
    Registered,
    /// Mobilization call-up credential issued.
    Mobilized,
    /// Service credential issued.
    InService,
    /// Discharge certificate issued (journey complete).
    Discharged,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Registered => "REGISTERED",
            Self::Mobilized => "MOBILIZED",
            Self::InService => "IN_SERVICE",
            Self::Discharged => "DISCHARGED",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from workflow record mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The phase was already recorded issued for this subject.
    #[error("{phase} already issued for subject {subject_key}")]
    PhaseAlreadyCompleted {
        /// The subject in question.
        subject_key: SubjectKey,
        /// The phase that was already complete.
        phase: EnrollmentPhase,
    },

    /// Attempted to replace an established (derived) subject key.
    #[error("subject key {existing} is established; refusing to adopt {attempted}")]
    SubjectKeyImmutable {
        /// The key already recorded.
        existing: SubjectKey,
        /// The key that was offered.
        attempted: SubjectKey,
    },
}

// ─── Phase Completion ────────────────────────────────────────────────

/// Completion state of one phase within a workflow record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCompletion {
    /// Whether the phase's credential has been issued.
    pub issued: bool,
    /// When the credential was issued.
    pub issued_at: Option<DateTime<Utc>>,
    /// Platform-assigned credential identifier.
    pub credential_id: Option<String>,
}

// ─── Workflow Patch ──────────────────────────────────────────────────

/// Partial update applied through the store's upsert.
///
/// `None` fields leave the record untouched; `Some` fields overwrite.
/// Proof data is merged key-by-key rather than replaced, so each phase's
/// raw proof snapshot accumulates alongside the earlier ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowPatch {
    /// The session currently driving the journey.
    pub session_id: Option<SessionId>,
    /// Holder surname.
    pub surname: Option<String>,
    /// Holder other names.
    pub othernames: Option<String>,
    /// Holder contact email.
    pub email: Option<String>,
    /// Holder contact phone.
    pub phone: Option<String>,
    /// Raw proof data to merge into the audit snapshot.
    pub proof_data: Option<serde_json::Value>,
}

// ─── Workflow Record ─────────────────────────────────────────────────

/// The accumulating state of one subject's enrollment journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    /// Stable subject key (`nin:` derived or `pending:` placeholder).
    pub subject_key: SubjectKey,
    /// The session that most recently touched this record.
    pub session_id: Option<SessionId>,
    /// Holder surname, from whichever phase first revealed it.
    pub surname: Option<String>,
    /// Holder other names.
    pub othernames: Option<String>,
    /// Holder contact email.
    pub email: Option<String>,
    /// Holder contact phone.
    pub phone: Option<String>,
    /// Furthest completed phase.
    pub status: WorkflowStatus,
    /// Registration phase completion.
    pub registration: PhaseCompletion,
    /// Mobilization phase completion.
    pub mobilization: PhaseCompletion,
    /// Service phase completion.
    pub service: PhaseCompletion,
    /// Discharge phase completion.
    pub discharge: PhaseCompletion,
    /// Raw proof payloads merged across phases, kept for audit.
    pub proof_data: serde_json::Value,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRecord {
    /// Create a fresh record for a subject.
    pub fn new(subject_key: SubjectKey) -> Self {
        let now = Utc::now();
        Self {
            subject_key,
            session_id: None,
            surname: None,
            othernames: None,
            email: None,
            phone: None,
            status: WorkflowStatus::Pending,
            registration: PhaseCompletion::default(),
            mobilization: PhaseCompletion::default(),
            service: PhaseCompletion::default(),
            discharge: PhaseCompletion::default(),
            proof_data: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update. `Some` fields win; proof data merges.
    pub fn apply(&mut self, patch: WorkflowPatch) {
        if let Some(session_id) = patch.session_id {
            self.session_id = Some(session_id);
        }
        if let Some(surname) = patch.surname {
            self.surname = Some(surname);
        }
        if let Some(othernames) = patch.othernames {
            self.othernames = Some(othernames);
        }
        if let Some(email) = patch.email {
            self.email = Some(email);
        }
        if let Some(phone) = patch.phone {
            self.phone = Some(phone);
        }
        if let Some(data) = patch.proof_data {
            merge_proof_data(&mut self.proof_data, data);
        }
        self.updated_at = Utc::now();
    }

    /// Completion state of a phase.
    pub fn phase(&self, phase: EnrollmentPhase) -> &PhaseCompletion {
        match phase {
            EnrollmentPhase::Registration => &self.registration,
            EnrollmentPhase::Mobilization => &self.mobilization,
            EnrollmentPhase::Service => &self.service,
            EnrollmentPhase::Discharge => &self.discharge,
        }
    }

    /// Whether a phase's credential has been issued.
    pub fn is_phase_complete(&self, phase: EnrollmentPhase) -> bool {
        self.phase(phase).issued
    }

    /// Record a phase's credential as issued.
    ///
    /// Flags are monotonic: a phase already complete is an error, which
    /// doubles as the server-side idempotency gate — the caller treats it
    /// as "already issued, do not issue again".
    pub fn complete_phase(
        &mut self,
        phase: EnrollmentPhase,
        credential_id: Option<String>,
    ) -> Result<(), WorkflowError> {
        let slot = self.phase_mut(phase);
        if slot.issued {
            return Err(WorkflowError::PhaseAlreadyCompleted {
                subject_key: self.subject_key.clone(),
                phase,
            });
        }
        slot.issued = true;
        slot.issued_at = Some(Utc::now());
        slot.credential_id = credential_id;
        self.status = self.furthest_status();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Prerequisite phases of `phase` that are not yet complete.
    pub fn missing_prerequisites(&self, phase: EnrollmentPhase) -> Vec<EnrollmentPhase> {
        phase
            .prerequisites()
            .iter()
            .copied()
            .filter(|p| !self.is_phase_complete(*p))
            .collect()
    }

    /// Adopt a derived subject key onto a placeholder record.
    ///
    /// This is the best-effort reconciliation path for records created
    /// before a national id was known. An established derived key never
    /// changes.
    pub fn adopt_subject_key(&mut self, key: SubjectKey) -> Result<(), WorkflowError> {
        if self.subject_key == key {
            return Ok(());
        }
        if self.subject_key.provenance() == SubjectKeyProvenance::Derived {
            return Err(WorkflowError::SubjectKeyImmutable {
                existing: self.subject_key.clone(),
                attempted: key,
            });
        }
        self.subject_key = key;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Clear all phase completions. Demo-data reset only.
    pub fn reset_phases(&mut self) {
        self.registration = PhaseCompletion::default();
        self.mobilization = PhaseCompletion::default();
        self.service = PhaseCompletion::default();
        self.discharge = PhaseCompletion::default();
        self.status = WorkflowStatus::Pending;
        self.updated_at = Utc::now();
    }

    fn phase_mut(&mut self, phase: EnrollmentPhase) -> &mut PhaseCompletion {
        match phase {
            EnrollmentPhase::Registration => &mut self.registration,
            EnrollmentPhase::Mobilization => &mut self.mobilization,
            EnrollmentPhase::Service => &mut self.service,
            EnrollmentPhase::Discharge => &mut self.discharge,
        }
    }

    fn furthest_status(&self) -> WorkflowStatus {
        if self.discharge.issued {
            WorkflowStatus::Discharged
        } else if self.service.issued {
            WorkflowStatus::InService
        } else if self.mobilization.issued {
            WorkflowStatus::Mobilized
        } else if self.registration.issued {
            WorkflowStatus::Registered
        } else {
            WorkflowStatus::Pending
        }
    }
}

/// Merge incoming proof data into the stored snapshot, key by key.
fn merge_proof_data(target: &mut serde_json::Value, incoming: serde_json::Value) {
    match (target, incoming) {
        (serde_json::Value::Object(existing), serde_json::Value::Object(new)) => {
            for (k, v) in new {
                existing.insert(k, v);
            }
        }
        (target, incoming) => *target = incoming,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
