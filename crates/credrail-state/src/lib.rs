//! # credrail-state — Domain State Machines
//!
//! Implements the stateful entities of the Credrail orchestration layer as
//! validated state machines. Each transition is a method that checks the
//! current state and either records the change (with a timestamped
//! transition log) or returns a structured error naming the current state
//! and the rejected transition.
//!
//! ## State Machines
//!
//! - **ConnectionSession** (`session.rs`): `Pending → Connected`, with
//!   expiry. Connection attachment is idempotent for the same connection id
//!   and rejected for a different one.
//!
//! - **ProofExchange** (`proof.rs`): `Requested → Pending → Done/Verified`
//!   with a `Failed` branch. Revealed attributes are only recorded at a
//!   terminal success status.
//!
//! - **PhaseProgress** (`phase.rs`): `NotStarted → ProofRequested →
//!   ProofVerified → Issued` with a `Failed` branch that preserves the
//!   upstream error code. One instance per enrollment phase invocation.
//!
//! - **WorkflowRecord** (`workflow.rs`): the durable per-subject record
//!   accumulating phase completions. Phase flags are monotonic — nothing
//!   short of an explicit reset clears them.
//!
//! ## Design
//!
//! These types carry no I/O. Stores and gateways live elsewhere; this crate
//! only guarantees that in-memory and persisted state can never represent an
//! invalid lifecycle (a connected session without a connection id, a proof
//! with revealed attributes before verification, a phase issued twice).

pub mod phase;
pub mod proof;
pub mod session;
pub mod workflow;

// ─── Session re-exports ─────────────────────────────────────────────

pub use session::{ConnectionSession, SessionError, SessionStatus, DEFAULT_SESSION_TTL_SECS};

// ─── Proof re-exports ───────────────────────────────────────────────

pub use proof::{ProofError, ProofExchange, ProofStatus};

// ─── Phase re-exports ───────────────────────────────────────────────

pub use phase::{EnrollmentPhase, PhaseError, PhaseProgress, PhaseState, PhaseTransitionRecord};

// ─── Workflow re-exports ────────────────────────────────────────────

pub use workflow::{WorkflowError, WorkflowPatch, WorkflowRecord, WorkflowStatus};
