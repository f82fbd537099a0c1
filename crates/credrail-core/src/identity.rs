//! # Domain Identity Newtypes
//!
//! Newtype wrappers for all identifiers in the Credrail stack. These prevent
//! accidental identifier confusion — you cannot pass a `ProofId` where a
//! `SessionId` is expected, and a wallet `ConnectionId` can never be mistaken
//! for a subject's national identification number.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a wallet connection session.
///
/// Server-generated; opaque to the client and to the credential platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

/// Identifier assigned by the credential platform once a wallet connects.
///
/// Opaque platform-controlled string; present on a session if and only if
/// the session is connected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

/// Identifier assigned by the credential platform to a proof exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProofId(pub String);

/// National Identification Number (11 digits).
///
/// First-class identifier type for the subject of an enrollment journey.
/// The all-zeros value is a known upstream placeholder and is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nin(String);

/// How a workflow record's subject key was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKeyProvenance {
    /// Derived from a verified national identification number.
    Derived,
    /// Synthesized from the owning session because no durable identifier
    /// was known yet. Reconciled on a best-effort basis once a national id
    /// is revealed by a later phase.
    Placeholder,
}

/// Stable key identifying the subject of a multi-phase workflow.
///
/// Derived keys use the `nin:` namespace; placeholder keys use `pending:`
/// with the owning session id. The namespace prefix makes provenance
/// recoverable from the key itself, so persisted records need no side table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectKey(String);

impl SessionId {
    /// Generate a new random session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a session identifier from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionId {
    /// Wrap a platform-assigned connection identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ProofId {
    /// Wrap a platform-assigned proof identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Nin {
    /// Known upstream placeholder emitted when the holder's wallet has no
    /// real national id on record.
    pub const PLACEHOLDER: &'static str = "00000000000";

    /// Validate and wrap a national identification number.
    ///
    /// Accepts exactly 11 ASCII digits. The all-zeros placeholder is
    /// rejected — it is an upstream sentinel, not an identity.
    pub fn new(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.len() != 11 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if trimmed == Self::PLACEHOLDER {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Whether a raw value is the known upstream placeholder.
    pub fn is_placeholder(s: &str) -> bool {
        s.trim() == Self::PLACEHOLDER
    }

    /// Access the inner digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl SubjectKey {
    /// Derive a subject key from a verified national id.
    pub fn from_nin(nin: &Nin) -> Self {
        Self(format!("nin:{}", nin.as_str()))
    }

    /// Synthesize a placeholder subject key from the owning session.
    pub fn placeholder(session: &SessionId) -> Self {
        Self(format!("pending:{}", session.as_uuid()))
    }

    /// Reconstruct a subject key from its persisted string form.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The provenance encoded in this key's namespace.
    pub fn provenance(&self) -> SubjectKeyProvenance {
        if self.0.starts_with("pending:") {
            SubjectKeyProvenance::Placeholder
        } else {
            SubjectKeyProvenance::Derived
        }
    }

    /// Access the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for ProofId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for Nin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
