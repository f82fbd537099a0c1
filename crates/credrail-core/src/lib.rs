//! # credrail-core — Foundational Types for the Credrail Stack
//!
//! This crate is the bedrock of the Credrail orchestration stack. It defines
//! the type-system primitives every other crate builds on, and the one piece
//! of pure computation in the system: flattening the credential platform's
//! loosely-structured proof-detail payloads into deterministic attribute maps.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `SessionId`, `ConnectionId`,
//!    `ProofId`, `SubjectKey`, `Nin` — all newtypes with validated
//!    constructors. No bare strings for identifiers.
//!
//! 2. **Tagged-union attribute decoding.** Proof-detail entries arrive either
//!    as bare strings or as `{"raw": value}` wrappers, mixed with schema
//!    metadata. Decoding goes through [`AttributeValue`] — unknown shapes
//!    decode to a discarded variant, never to a crash.
//!
//! 3. **Explicit configuration.** The platform organization id, credential
//!    definition ids, and attribute defaults live in [`PlatformConfig`],
//!    threaded into gateways at construction time. Missing configuration is
//!    a dedicated error path, not a fallback chain.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `credrail-*` crates (leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize` where they cross a boundary.

pub mod attribute;
pub mod config;
pub mod identity;

pub use attribute::{
    normalize, validate_required, AttributeValue, MissingAttributeError, ATTRIBUTE_METADATA_KEYS,
};
pub use config::{ConfigError, PlatformConfig};
pub use identity::{ConnectionId, Nin, ProofId, SessionId, SubjectKey, SubjectKeyProvenance};
