//! # Application State and In-Memory Stores
//!
//! Shared state for the Axum application: the platform client, the three
//! stores, and the optional database pool.
//!
//! The in-memory stores are the source of truth for reads. When a database
//! pool is configured, every workflow mutation writes through to Postgres
//! and records are hydrated back on startup — sessions and proof exchanges
//! are session-scoped and deliberately not persisted.
//!
//! ## Concurrency
//!
//! Each store is an `Arc<RwLock<HashMap>>` (parking_lot). Every mutation
//! takes the write lock for its full read-modify-write, so an upsert or a
//! phase-completion check can never interleave with another writer for the
//! same subject. The issuance claim set additionally serializes the
//! check-then-issue window across concurrent requests for one
//! (subject, phase) pair.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::{Mutex, RwLock};
use sqlx::PgPool;

use credrail_client::PlatformClient;
use credrail_core::{Nin, PlatformConfig, ProofId, SessionId, SubjectKey};
use credrail_state::{
    ConnectionSession, EnrollmentPhase, ProofExchange, SessionError, SessionStatus,
    WorkflowPatch, WorkflowRecord,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Platform configuration (also threaded into the client).
    pub config: Arc<PlatformConfig>,
    /// Credential platform client.
    pub platform: Arc<PlatformClient>,
    /// Wallet connection sessions (ephemeral).
    pub sessions: SessionStore,
    /// Proof exchanges (ephemeral, session-scoped).
    pub proofs: ProofStore,
    /// Durable per-subject workflow records.
    pub workflows: WorkflowStore,
    /// Optional Postgres pool for workflow persistence.
    pub db_pool: Option<PgPool>,
    /// API bearer token; `None` disables authentication.
    pub auth_token: Option<String>,
}

impl AppState {
    /// Assemble the application state.
    pub fn new(
        config: PlatformConfig,
        platform: PlatformClient,
        db_pool: Option<PgPool>,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            platform: Arc::new(platform),
            sessions: SessionStore::new(),
            proofs: ProofStore::new(),
            workflows: WorkflowStore::new(),
            db_pool,
            auth_token,
        }
    }
}

// ─── Session Store ───────────────────────────────────────────────────

/// In-memory store of wallet connection sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionId, ConnectionSession>>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new pending session and return it.
    pub fn create(&self, ttl_secs: Option<i64>) -> ConnectionSession {
        let session = match ttl_secs {
            Some(secs) => ConnectionSession::with_ttl(Duration::seconds(secs)),
            None => ConnectionSession::new(),
        };
        self.inner
            .write()
            .insert(session.session_id.clone(), session.clone());
        session
    }

    /// Look up a session, surfacing expiry.
    ///
    /// Returns `None` for unknown sessions. Expired sessions are marked as
    /// such and still returned — callers decide whether expired reads as
    /// not-found (orchestration) or as status (the session status route).
    pub fn get(&self, session_id: &SessionId) -> Option<ConnectionSession> {
        let mut guard = self.inner.write();
        let session = guard.get_mut(session_id)?;
        session.check_expiry(Utc::now());
        Some(session.clone())
    }

    /// Look up a session that must still be live.
    pub fn get_active(&self, session_id: &SessionId) -> Result<ConnectionSession, SessionError> {
        let mut guard = self.inner.write();
        let session = guard
            .get_mut(session_id)
            .ok_or_else(|| SessionError::Expired {
                session_id: session_id.clone(),
            })?;
        session.check_expiry(Utc::now());
        if session.status == SessionStatus::Expired {
            return Err(SessionError::Expired {
                session_id: session_id.clone(),
            });
        }
        Ok(session.clone())
    }

    /// Attach a wallet connection to a session (idempotent).
    pub fn attach(
        &self,
        session_id: &SessionId,
        connection_id: credrail_core::ConnectionId,
    ) -> Option<Result<ConnectionSession, SessionError>> {
        let mut guard = self.inner.write();
        let session = guard.get_mut(session_id)?;
        Some(
            session
                .attach_connection(connection_id)
                .map(|()| session.clone()),
        )
    }

    /// Drop expired sessions; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut guard = self.inner.write();
        let before = guard.len();
        guard.retain(|_, s| !s.is_expired_at(now));
        before - guard.len()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Session counts by status, for metrics.
    pub fn counts_by_status(&self) -> HashMap<String, usize> {
        let guard = self.inner.read();
        let mut counts = HashMap::new();
        for session in guard.values() {
            *counts.entry(session.status.to_string()).or_default() += 1;
        }
        counts
    }

    /// Remove all sessions (demo reset).
    pub fn clear(&self) -> usize {
        let mut guard = self.inner.write();
        let n = guard.len();
        guard.clear();
        n
    }
}

// ─── Proof Store ─────────────────────────────────────────────────────

/// In-memory store of proof exchanges.
#[derive(Debug, Clone, Default)]
pub struct ProofStore {
    inner: Arc<RwLock<HashMap<ProofId, ProofExchange>>>,
}

impl ProofStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly requested exchange.
    pub fn insert(&self, exchange: ProofExchange) {
        self.inner
            .write()
            .insert(exchange.proof_id.clone(), exchange);
    }

    /// Look up an exchange.
    pub fn get(&self, proof_id: &ProofId) -> Option<ProofExchange> {
        self.inner.read().get(proof_id).cloned()
    }

    /// Mutate an exchange under the write lock.
    pub fn with_mut<R>(
        &self,
        proof_id: &ProofId,
        f: impl FnOnce(&mut ProofExchange) -> R,
    ) -> Option<R> {
        let mut guard = self.inner.write();
        guard.get_mut(proof_id).map(f)
    }

    /// Number of stored exchanges.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Exchange counts by status, for metrics.
    pub fn counts_by_status(&self) -> HashMap<String, usize> {
        let guard = self.inner.read();
        let mut counts = HashMap::new();
        for exchange in guard.values() {
            *counts.entry(exchange.status.to_string()).or_default() += 1;
        }
        counts
    }

    /// Remove all exchanges (demo reset).
    pub fn clear(&self) -> usize {
        let mut guard = self.inner.write();
        let n = guard.len();
        guard.clear();
        n
    }
}

// ─── Workflow Store ──────────────────────────────────────────────────

/// A claim on the issuance window for one (subject, phase) pair.
///
/// Held between the already-issued check and the phase-completion write so
/// two concurrent completions of the same phase cannot both issue. Dropping
/// the claim releases the window; [`WorkflowStore::mark_phase_complete`]
/// consumes it on success.
#[derive(Debug)]
pub struct IssuanceClaim {
    key: (String, EnrollmentPhase),
    in_flight: Arc<Mutex<HashSet<(String, EnrollmentPhase)>>>,
    released: bool,
}

impl IssuanceClaim {
    fn release(&mut self) {
        if !self.released {
            self.in_flight.lock().remove(&self.key);
            self.released = true;
        }
    }
}

impl Drop for IssuanceClaim {
    fn drop(&mut self) {
        self.release();
    }
}

/// Why an issuance claim could not be taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimRejected {
    /// The phase is already recorded issued; the recorded credential id is
    /// returned for the idempotent response.
    AlreadyIssued(Option<String>),
    /// Another request is mid-issuance for the same pair.
    InFlight,
}

/// In-memory store of durable workflow records, keyed by subject.
#[derive(Debug, Clone, Default)]
pub struct WorkflowStore {
    records: Arc<RwLock<HashMap<String, WorkflowRecord>>>,
    in_flight: Arc<Mutex<HashSet<(String, EnrollmentPhase)>>>,
}

impl WorkflowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a record: create it on first contact, then apply the patch.
    ///
    /// One write lock covers the whole read-modify-write, so concurrent
    /// upserts for the same subject can never produce duplicate records or
    /// lose fields.
    pub fn upsert(&self, subject_key: &SubjectKey, patch: WorkflowPatch) -> WorkflowRecord {
        let mut guard = self.records.write();
        let record = guard
            .entry(subject_key.as_str().to_string())
            .or_insert_with(|| WorkflowRecord::new(subject_key.clone()));
        record.apply(patch);
        record.clone()
    }

    /// Look up a record by subject key.
    pub fn find_by_subject_key(&self, subject_key: &SubjectKey) -> Option<WorkflowRecord> {
        self.records.read().get(subject_key.as_str()).cloned()
    }

    /// Look up a record by national id.
    pub fn find_by_nin(&self, nin: &Nin) -> Option<WorkflowRecord> {
        self.find_by_subject_key(&SubjectKey::from_nin(nin))
    }

    /// Look up a record by the session that last touched it.
    pub fn find_by_session(&self, session_id: &SessionId) -> Option<WorkflowRecord> {
        self.records
            .read()
            .values()
            .find(|r| r.session_id.as_ref() == Some(session_id))
            .cloned()
    }

    /// Claim the issuance window for (subject, phase).
    ///
    /// Fails when the phase is already issued (the idempotency gate) or
    /// when another request holds the window.
    pub fn claim_issuance(
        &self,
        subject_key: &SubjectKey,
        phase: EnrollmentPhase,
    ) -> Result<IssuanceClaim, ClaimRejected> {
        let records = self.records.read();
        if let Some(record) = records.get(subject_key.as_str()) {
            if record.is_phase_complete(phase) {
                return Err(ClaimRejected::AlreadyIssued(
                    record.phase(phase).credential_id.clone(),
                ));
            }
        }
        drop(records);

        let key = (subject_key.as_str().to_string(), phase);
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(key.clone()) {
            return Err(ClaimRejected::InFlight);
        }
        Ok(IssuanceClaim {
            key,
            in_flight: self.in_flight.clone(),
            released: false,
        })
    }

    /// Record a phase's credential as issued, consuming the claim.
    ///
    /// Returns the updated record. The monotonic flag check inside the
    /// record is the last line of defense; with the claim protocol it
    /// cannot fire.
    pub fn mark_phase_complete(
        &self,
        mut claim: IssuanceClaim,
        subject_key: &SubjectKey,
        phase: EnrollmentPhase,
        credential_id: Option<String>,
    ) -> Result<WorkflowRecord, credrail_state::WorkflowError> {
        let mut guard = self.records.write();
        let record = guard
            .entry(subject_key.as_str().to_string())
            .or_insert_with(|| WorkflowRecord::new(subject_key.clone()));
        record.complete_phase(phase, credential_id)?;
        let snapshot = record.clone();
        drop(guard);
        claim.release();
        Ok(snapshot)
    }

    /// Fold a placeholder record for `session_id` into the derived subject.
    ///
    /// Best-effort demo affordance: identity fields fill gaps, phase
    /// completions merge monotonically, proof data merges key-by-key. The
    /// placeholder record is removed. Returns whether a merge happened.
    pub fn reconcile_session_placeholder(
        &self,
        session_id: &SessionId,
        derived: &SubjectKey,
    ) -> bool {
        let placeholder = SubjectKey::placeholder(session_id);
        let mut guard = self.records.write();
        let Some(mut orphan) = guard.remove(placeholder.as_str()) else {
            return false;
        };

        tracing::info!(
            placeholder = %placeholder,
            subject = %derived,
            "reconciling placeholder workflow record"
        );

        match guard.get_mut(derived.as_str()) {
            Some(target) => {
                for phase in EnrollmentPhase::ALL {
                    let slot = orphan.phase(phase).clone();
                    if slot.issued && !target.is_phase_complete(phase) {
                        // Merge ignores the already-complete error by construction.
                        let _ = target.complete_phase(phase, slot.credential_id);
                    }
                }
                target.apply(WorkflowPatch {
                    session_id: orphan.session_id.clone(),
                    surname: orphan.surname.clone(),
                    othernames: orphan.othernames.clone(),
                    email: orphan.email.clone(),
                    phone: orphan.phone.clone(),
                    proof_data: Some(orphan.proof_data.clone()),
                });
            }
            None => {
                if orphan.adopt_subject_key(derived.clone()).is_ok() {
                    guard.insert(derived.as_str().to_string(), orphan);
                }
            }
        }
        true
    }

    /// Replace a record wholesale (startup hydration).
    pub fn hydrate(&self, record: WorkflowRecord) {
        self.records
            .write()
            .insert(record.subject_key.as_str().to_string(), record);
    }

    /// All records, for metrics and the admin surface.
    pub fn list(&self) -> Vec<WorkflowRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Remove all records (demo reset).
    pub fn clear(&self) -> usize {
        let mut guard = self.records.write();
        let n = guard.len();
        guard.clear();
        n
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
