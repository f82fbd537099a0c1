//! # Enrollment Phases and Phase Progress
//!
//! The enrollment journey is four sequential phases, each gated on a proof
//! of the previous phase's credential:
//!
//! ```text
//! Registration ──▶ Mobilization ──▶ Service ──▶ Discharge
//! ```
//!
//! One [`PhaseProgress`] state machine tracks a single orchestrator
//! invocation for one phase:
//!
//! ```text
//! NotStarted ──▶ ProofRequested ──▶ ProofVerified ──▶ Issued
//!      ▲               │                  │
//!      │               └────────┬─────────┘
//!      │                        ▼
//!      └───(retry)─────────── Failed
//! ```
//!
//! ## Design Decision
//!
//! Phases use an enum with validated sequential ordering rather than one
//! typestate type per phase — the phase set is fixed at four and the only
//! invariant (phase N's prerequisites are phases 1..N-1) is a one-line
//! check. The per-invocation progress machine validates transitions at
//! runtime and records a transition log, the same shape as the session and
//! proof machines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use chrono::{DateTime, Utc};
use credrail_core::config::CredentialDefinitions;

// ─── Enrollment Phases ───────────────────────────────────────────────

/// The four phases of the enrollment journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EnrollmentPhase {
    /// Phase 1: identity verification and registration credential.
    Registration = 1,
    /// Phase 2: mobilization call-up credential.
    Mobilization = 2,
    /// Phase 3: active service credential.
    Service = 3,
    /// Phase 4: discharge certificate.
    Discharge = 4,
}

impl EnrollmentPhase {
    /// All phases in journey order.
    pub const ALL: [EnrollmentPhase; 4] = [
        Self::Registration,
        Self::Mobilization,
        Self::Service,
        Self::Discharge,
    ];

    /// The numeric phase number (1-4).
    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Parse a phase from its route-path form (`registration`, …).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registration" => Some(Self::Registration),
            "mobilization" => Some(Self::Mobilization),
            "service" => Some(Self::Service),
            "discharge" => Some(Self::Discharge),
            _ => None,
        }
    }

    /// The phases that must be complete before this one may issue.
    pub fn prerequisites(&self) -> &'static [EnrollmentPhase] {
        match self {
            Self::Registration => &[],
            Self::Mobilization => &[Self::Registration],
            Self::Service => &[Self::Registration, Self::Mobilization],
            Self::Discharge => &[Self::Registration, Self::Mobilization, Self::Service],
        }
    }

    /// Attribute names requested in this phase's proof.
    pub fn requested_attributes(&self) -> &'static [&'static str] {
        // Every phase re-proves the identity triple; the holder's wallet
        // satisfies it from whichever credential the restrictions admit.
        &["surname", "othernames", "national_id_number"]
    }

    /// Attribute names that must carry usable values for this phase.
    ///
    /// `othernames` is only mandatory at registration — later phases prove
    /// a credential we issued, where it may legitimately be the configured
    /// default.
    pub fn required_attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Registration => &["surname", "othernames", "national_id_number"],
            _ => &["surname", "national_id_number"],
        }
    }

    /// The credential-definition id this phase issues against.
    pub fn cred_def<'a>(&self, defs: &'a CredentialDefinitions) -> &'a str {
        match self {
            Self::Registration => &defs.registration,
            Self::Mobilization => &defs.mobilization,
            Self::Service => &defs.service,
            Self::Discharge => &defs.discharge,
        }
    }

    /// Environment variable naming this phase's credential definition.
    pub fn cred_def_env_var(&self) -> &'static str {
        match self {
            Self::Registration => "CREDRAIL_CRED_DEF_REGISTRATION",
            Self::Mobilization => "CREDRAIL_CRED_DEF_MOBILIZATION",
            Self::Service => "CREDRAIL_CRED_DEF_SERVICE",
            Self::Discharge => "CREDRAIL_CRED_DEF_DISCHARGE",
        }
    }

    /// Human-readable credential definition name for error messages.
    pub fn cred_def_name(&self) -> &'static str {
        match self {
            Self::Registration => "registration credential definition",
            Self::Mobilization => "mobilization credential definition",
            Self::Service => "service credential definition",
            Self::Discharge => "discharge credential definition",
        }
    }
}

impl std::fmt::Display for EnrollmentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Registration => "REGISTRATION",
            Self::Mobilization => "MOBILIZATION",
            Self::Service => "SERVICE",
            Self::Discharge => "DISCHARGE",
        };
        f.write_str(s)
    }
}

// ─── Phase Progress State ────────────────────────────────────────────

/// The state of one orchestrator invocation for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    /// No proof has been requested yet.
    NotStarted,
    /// Proof request accepted by the platform.
    ProofRequested,
    /// Proof verified and required attributes validated.
    ProofVerified,
    /// Credential issued and the workflow record updated (terminal).
    Issued,
    /// A step failed; the upstream error code is preserved.
    Failed,
}

impl std::fmt::Display for PhaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::ProofRequested => "PROOF_REQUESTED",
            Self::ProofVerified => "PROOF_VERIFIED",
            Self::Issued => "ISSUED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from phase progress transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    /// Attempted transition is not valid from the current state.
    #[error("invalid {phase} transition: {from} -> {to}")]
    InvalidTransition {
        /// The phase in question.
        phase: EnrollmentPhase,
        /// Current state.
        from: PhaseState,
        /// Attempted target state.
        to: PhaseState,
    },

    /// The phase has already issued its credential.
    #[error("{phase} has already issued its credential")]
    AlreadyIssued {
        /// The phase in question.
        phase: EnrollmentPhase,
    },
}

// ─── Transition Record ───────────────────────────────────────────────

/// Record of one phase progress transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransitionRecord {
    /// State before the transition.
    pub from_state: PhaseState,
    /// State after the transition.
    pub to_state: PhaseState,
    /// When the transition occurred.
    pub timestamp: DateTime<Utc>,
    /// Error code, recorded on transitions into `Failed`.
    pub error_code: Option<String>,
}

// ─── Phase Progress ──────────────────────────────────────────────────

/// Progress of one orchestrator invocation through one enrollment phase.
///
/// Enforces the orchestrator's state machine: proof must be requested
/// before verification, verification before issuance, and issuance exactly
/// once. Failures preserve the upstream error code for the caller; the
/// machine can be retried from `Failed` but never re-issued from `Issued`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseProgress {
    /// The phase being progressed.
    pub phase: EnrollmentPhase,
    /// Current state.
    pub state: PhaseState,
    /// Error code of the most recent failure, if any.
    pub error_code: Option<String>,
    /// Ordered log of all transitions.
    pub transitions: Vec<PhaseTransitionRecord>,
}

impl PhaseProgress {
    /// Start tracking a phase invocation.
    pub fn new(phase: EnrollmentPhase) -> Self {
        Self {
            phase,
            state: PhaseState::NotStarted,
            error_code: None,
            transitions: Vec::new(),
        }
    }

    /// NOT_STARTED → PROOF_REQUESTED on proof-request success.
    pub fn proof_requested(&mut self) -> Result<(), PhaseError> {
        self.require_state(PhaseState::NotStarted, PhaseState::ProofRequested)?;
        self.do_transition(PhaseState::ProofRequested, None);
        Ok(())
    }

    /// PROOF_REQUESTED → PROOF_VERIFIED on terminal success plus validation.
    pub fn proof_verified(&mut self) -> Result<(), PhaseError> {
        self.require_state(PhaseState::ProofRequested, PhaseState::ProofVerified)?;
        self.do_transition(PhaseState::ProofVerified, None);
        Ok(())
    }

    /// PROOF_VERIFIED → ISSUED on issuance plus workflow update.
    pub fn issued(&mut self) -> Result<(), PhaseError> {
        if self.state == PhaseState::Issued {
            return Err(PhaseError::AlreadyIssued { phase: self.phase });
        }
        self.require_state(PhaseState::ProofVerified, PhaseState::Issued)?;
        self.do_transition(PhaseState::Issued, None);
        Ok(())
    }

    /// Any non-terminal state → FAILED, preserving the error code.
    pub fn failed(&mut self, error_code: impl Into<String>) -> Result<(), PhaseError> {
        if self.state == PhaseState::Issued {
            return Err(PhaseError::InvalidTransition {
                phase: self.phase,
                from: self.state,
                to: PhaseState::Failed,
            });
        }
        let code = error_code.into();
        self.error_code = Some(code.clone());
        self.do_transition(PhaseState::Failed, Some(code));
        Ok(())
    }

    /// FAILED → NOT_STARTED; the client chose to re-invoke the phase.
    pub fn retry(&mut self) -> Result<(), PhaseError> {
        self.require_state(PhaseState::Failed, PhaseState::NotStarted)?;
        self.error_code = None;
        self.do_transition(PhaseState::NotStarted, None);
        Ok(())
    }

    /// Whether this invocation reached issuance.
    pub fn is_issued(&self) -> bool {
        self.state == PhaseState::Issued
    }

    fn require_state(&self, expected: PhaseState, target: PhaseState) -> Result<(), PhaseError> {
        if self.state != expected {
            return Err(PhaseError::InvalidTransition {
                phase: self.phase,
                from: self.state,
                to: target,
            });
        }
        Ok(())
    }

    fn do_transition(&mut self, to: PhaseState, error_code: Option<String>) {
        self.transitions.push(PhaseTransitionRecord {
            from_state: self.state,
            to_state: to,
            timestamp: Utc::now(),
            error_code,
        });
        self.state = to;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
