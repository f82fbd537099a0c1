//! # Connection Session Lifecycle
//!
//! Models one wallet-to-platform connection session.
//!
//! ## States
//!
//! ```text
//! Pending ──▶ Connected
//!    │            │
//!    └──────┬─────┘
//!           ▼
//!        Expired (terminal)
//! ```
//!
//! ## Invariant
//!
//! `connection_id` is present if and only if the session is `Connected`.
//! The platform's connection callback attaches the id exactly once;
//! re-attaching the same id is a no-op, attaching a different id is a
//! conflict. Expired sessions are read as not-found by callers — the holder
//! must reconnect their wallet, there is nothing to retry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use credrail_core::{ConnectionId, SessionId};

/// Default session lifetime in seconds.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

// ─── Session Status ──────────────────────────────────────────────────

/// The lifecycle status of a connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session created, waiting for the wallet to connect.
    Pending,
    /// Wallet connected; a connection id is recorded.
    Connected,
    /// Session lifetime elapsed (terminal).
    Expired,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Connected => "CONNECTED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from session lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session's lifetime has elapsed.
    #[error("session {session_id} has expired; reconnect the wallet")]
    Expired {
        /// The expired session.
        session_id: SessionId,
    },

    /// A different connection id is already attached.
    #[error(
        "session {session_id} is already bound to connection {existing}; \
         refusing to attach {attempted}"
    )]
    ConnectionMismatch {
        /// The session in question.
        session_id: SessionId,
        /// The connection id already recorded.
        existing: ConnectionId,
        /// The conflicting connection id that was offered.
        attempted: ConnectionId,
    },
}

// ─── Connection Session ──────────────────────────────────────────────

/// One wallet-to-platform connection session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSession {
    /// Unique session identifier (server-generated).
    pub session_id: SessionId,
    /// Platform-assigned connection id, present once connected.
    pub connection_id: Option<ConnectionId>,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

impl ConnectionSession {
    /// Create a new pending session with the default lifetime.
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_SESSION_TTL_SECS))
    }

    /// Create a new pending session with an explicit lifetime.
    pub fn with_ttl(ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            connection_id: None,
            status: SessionStatus::Pending,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Attach the platform-assigned connection id.
    ///
    /// Idempotent: attaching the id already recorded succeeds without
    /// change. Attaching a different id is a conflict — two orchestration
    /// steps must never race a session onto different wallet connections.
    pub fn attach_connection(&mut self, connection_id: ConnectionId) -> Result<(), SessionError> {
        self.check_expiry(Utc::now());
        if self.status == SessionStatus::Expired {
            return Err(SessionError::Expired {
                session_id: self.session_id.clone(),
            });
        }
        match &self.connection_id {
            Some(existing) if *existing == connection_id => Ok(()),
            Some(existing) => Err(SessionError::ConnectionMismatch {
                session_id: self.session_id.clone(),
                existing: existing.clone(),
                attempted: connection_id,
            }),
            None => {
                self.connection_id = Some(connection_id);
                self.status = SessionStatus::Connected;
                Ok(())
            }
        }
    }

    /// Whether the session's lifetime has elapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Expired || now >= self.expires_at
    }

    /// Mark the session expired if its lifetime has elapsed at `now`.
    pub fn check_expiry(&mut self, now: DateTime<Utc>) {
        if self.status != SessionStatus::Expired && now >= self.expires_at {
            self.status = SessionStatus::Expired;
        }
    }

    /// Whether a wallet connection is live on this session.
    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }
}

impl Default for ConnectionSession {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
