//! # Proof Exchange Lifecycle
//!
//! Models one proof request/response cycle against the credential platform.
//!
//! ## States
//!
//! ```text
//! Requested ──▶ Pending ──▶ Done ─┐
//!     │            │              ├─▶ terminal success
//!     │            └──────▶ Verified
//!     │            │
//!     └────────────┴──────▶ Failed (terminal)
//! ```
//!
//! The platform is not consistent about whether a successfully presented
//! proof reports `done` or `verified`; both are treated as terminal success
//! everywhere in this crate.
//!
//! ## Invariant
//!
//! `revealed_attributes` is empty until the exchange reaches a terminal
//! success status. Attributes can only be recorded together with the status
//! that revealed them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use credrail_core::{ProofId, SessionId};

// ─── Proof Status ────────────────────────────────────────────────────

/// Status of a proof exchange, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    /// Proof request sent; no holder response yet.
    Requested,
    /// Holder has received the request; presentation in flight.
    Pending,
    /// Presentation received and accepted (terminal success).
    Done,
    /// Presentation received and cryptographically verified
    /// (terminal success).
    Verified,
    /// Exchange failed or was abandoned (terminal).
    Failed,
}

impl ProofStatus {
    /// Parse a platform-reported status string.
    ///
    /// Unknown strings return `None`; callers decide whether to treat an
    /// unrecognized status as still-pending or as a protocol error.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requested" | "request-sent" => Some(Self::Requested),
            "pending" | "presentation-received" => Some(Self::Pending),
            "done" => Some(Self::Done),
            "verified" => Some(Self::Verified),
            "failed" | "abandoned" | "declined" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this status is terminal success (`done` or `verified`).
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, Self::Done | Self::Verified)
    }

    /// Whether this status is terminal (success or failure).
    pub fn is_terminal(&self) -> bool {
        self.is_terminal_success() || matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Requested => "REQUESTED",
            Self::Pending => "PENDING",
            Self::Done => "DONE",
            Self::Verified => "VERIFIED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from proof exchange state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// Attributes offered for a status that does not reveal them.
    #[error("proof {proof_id} cannot record attributes at status {status}")]
    AttributesBeforeSuccess {
        /// The proof exchange in question.
        proof_id: ProofId,
        /// The non-success status that was reported.
        status: ProofStatus,
    },

    /// A terminal exchange was asked to change status.
    #[error("proof {proof_id} is terminal at {status}; ignoring transition to {attempted}")]
    AlreadyTerminal {
        /// The proof exchange in question.
        proof_id: ProofId,
        /// The terminal status already recorded.
        status: ProofStatus,
        /// The transition that was attempted.
        attempted: ProofStatus,
    },
}

// ─── Proof Exchange ──────────────────────────────────────────────────

/// One proof request/response cycle, owned by a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofExchange {
    /// Platform-assigned proof identifier.
    pub proof_id: ProofId,
    /// The session that owns this exchange.
    pub session_id: SessionId,
    /// Attribute names requested from the holder.
    pub requested_attributes: Vec<String>,
    /// Current exchange status.
    pub status: ProofStatus,
    /// Normalized revealed attributes; populated only at terminal success.
    pub revealed_attributes: BTreeMap<String, String>,
    /// When the proof was requested.
    pub requested_at: DateTime<Utc>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

impl ProofExchange {
    /// Record a newly requested proof exchange.
    pub fn new(proof_id: ProofId, session_id: SessionId, requested_attributes: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            proof_id,
            session_id,
            requested_attributes,
            status: ProofStatus::Requested,
            revealed_attributes: BTreeMap::new(),
            requested_at: now,
            updated_at: now,
        }
    }

    /// Record a non-revealing status update from a poll.
    ///
    /// Terminal exchanges reject further transitions — a late or repeated
    /// poll can never un-verify a proof.
    pub fn update_status(&mut self, status: ProofStatus) -> Result<(), ProofError> {
        if self.status.is_terminal() && status != self.status {
            return Err(ProofError::AlreadyTerminal {
                proof_id: self.proof_id.clone(),
                status: self.status,
                attempted: status,
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record terminal success together with the revealed attributes.
    pub fn complete(
        &mut self,
        status: ProofStatus,
        revealed: BTreeMap<String, String>,
    ) -> Result<(), ProofError> {
        if !status.is_terminal_success() {
            return Err(ProofError::AttributesBeforeSuccess {
                proof_id: self.proof_id.clone(),
                status,
            });
        }
        if self.status.is_terminal() && self.status != status {
            return Err(ProofError::AlreadyTerminal {
                proof_id: self.proof_id.clone(),
                status: self.status,
                attempted: status,
            });
        }
        self.status = status;
        self.revealed_attributes = revealed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether this exchange has revealed attributes to consume.
    pub fn is_verified(&self) -> bool {
        self.status.is_terminal_success()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_exchange() -> ProofExchange {
        ProofExchange::new(
            ProofId::new("proof-1"),
            SessionId::new(),
            vec!["surname".to_string(), "national_id_number".to_string()],
        )
    }

    fn attrs() -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("surname".to_string(), "Doe".to_string());
        m.insert("national_id_number".to_string(), "12345678901".to_string());
        m
    }

    // ── Status parsing ───────────────────────────────────────────────

    #[test]
    fn test_parse_known_statuses() {
        assert_eq!(ProofStatus::parse("done"), Some(ProofStatus::Done));
        assert_eq!(ProofStatus::parse("Verified"), Some(ProofStatus::Verified));
        assert_eq!(ProofStatus::parse(" pending "), Some(ProofStatus::Pending));
        assert_eq!(ProofStatus::parse("request-sent"), Some(ProofStatus::Requested));
        assert_eq!(ProofStatus::parse("abandoned"), Some(ProofStatus::Failed));
    }

    #[test]
    fn test_parse_unknown_status() {
        assert_eq!(ProofStatus::parse("weird"), None);
        assert_eq!(ProofStatus::parse(""), None);
    }

    #[test]
    fn test_done_and_verified_are_both_terminal_success() {
        assert!(ProofStatus::Done.is_terminal_success());
        assert!(ProofStatus::Verified.is_terminal_success());
        assert!(!ProofStatus::Pending.is_terminal_success());
        assert!(ProofStatus::Failed.is_terminal());
        assert!(!ProofStatus::Failed.is_terminal_success());
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    #[test]
    fn test_new_exchange_has_no_attributes() {
        let e = make_exchange();
        assert_eq!(e.status, ProofStatus::Requested);
        assert!(e.revealed_attributes.is_empty());
        assert!(!e.is_verified());
    }

    #[test]
    fn test_update_status_to_pending() {
        let mut e = make_exchange();
        e.update_status(ProofStatus::Pending).unwrap();
        assert_eq!(e.status, ProofStatus::Pending);
        assert!(e.revealed_attributes.is_empty());
    }

    #[test]
    fn test_complete_records_attributes() {
        let mut e = make_exchange();
        e.complete(ProofStatus::Verified, attrs()).unwrap();
        assert!(e.is_verified());
        assert_eq!(e.revealed_attributes["surname"], "Doe");
    }

    #[test]
    fn test_complete_rejects_non_success_status() {
        let mut e = make_exchange();
        let err = e.complete(ProofStatus::Pending, attrs()).unwrap_err();
        assert!(matches!(err, ProofError::AttributesBeforeSuccess { .. }));
        assert!(e.revealed_attributes.is_empty());
    }

    #[test]
    fn test_terminal_exchange_rejects_transitions() {
        let mut e = make_exchange();
        e.complete(ProofStatus::Done, attrs()).unwrap();
        let err = e.update_status(ProofStatus::Failed).unwrap_err();
        assert!(matches!(err, ProofError::AlreadyTerminal { .. }));
        assert_eq!(e.status, ProofStatus::Done);
    }

    #[test]
    fn test_repeated_identical_terminal_status_is_noop() {
        let mut e = make_exchange();
        e.complete(ProofStatus::Done, attrs()).unwrap();
        // A second poll reporting the same terminal status is not an error.
        e.update_status(ProofStatus::Done).unwrap();
        e.complete(ProofStatus::Done, attrs()).unwrap();
        assert_eq!(e.status, ProofStatus::Done);
    }

    // ── Serde ────────────────────────────────────────────────────────

    #[test]
    fn test_exchange_serde_roundtrip() {
        let mut e = make_exchange();
        e.complete(ProofStatus::Verified, attrs()).unwrap();
        let json = serde_json::to_string(&e).unwrap();
        let back: ProofExchange = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, e.status);
        assert_eq!(back.revealed_attributes, e.revealed_attributes);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ProofStatus::Verified).unwrap();
        assert_eq!(json, "\"verified\"");
    }
}
