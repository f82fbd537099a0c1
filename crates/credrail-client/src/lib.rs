//! # credrail-client — Credential Platform HTTP Client
//!
//! Typed client for the external credential platform's REST API. This is
//! the only crate that talks to the network; everything above it consumes
//! structured results and the [`PlatformError`] taxonomy.
//!
//! ## Architecture
//!
//! [`PlatformClient`] wraps a `reqwest::Client` with the platform base URL,
//! per-request timeout (default 30 s), and bearer-token authentication. The
//! token is acquired from the platform's auth endpoint, cached, and
//! refreshed transparently exactly once when a call comes back 401 — a
//! second 401 is surfaced to the caller, never retried again.
//!
//! ## Gateways
//!
//! - **Proof** (`proof.rs`): request an out-of-band proof presentation
//!   (every attribute scoped to a credential-definition restriction) and
//!   poll its status/detail.
//! - **Issuance** (`issuance.rs`): offer a credential over an existing
//!   wallet connection or out-of-band by email. Attribute values are
//!   sanitized before the call — the platform rejects empty values, so
//!   empties and the literal `"null"`/`"undefined"` junk are replaced with
//!   the configured default.
//!
//! ## Error Handling
//!
//! Misconfiguration (missing org id or credential-definition id) is
//! detected before any request is made. Transport failures and timeouts map
//! to [`PlatformError::Unavailable`]; structured platform rejections keep
//! their status and body for diagnostics. Retry policy beyond the single
//! re-authentication is the caller's decision, not the client's.

pub mod auth;
pub mod error;
pub mod issuance;
pub mod proof;
pub mod types;

use std::time::Duration;

use credrail_core::PlatformConfig;

pub use error::PlatformError;
pub use issuance::IssuanceReceipt;
pub use proof::{ProofRequestReceipt, ProofStatusDetail};
pub use types::CredentialAttribute;

use auth::TokenCache;

/// HTTP client for the external credential platform.
///
/// Cheap to clone is not a goal — construct once at startup and share via
/// `Arc` across request handlers.
#[derive(Debug)]
pub struct PlatformClient {
    http: reqwest::Client,
    config: PlatformConfig,
    base_url: String,
    token: TokenCache,
}

impl PlatformClient {
    /// Build a client from the platform configuration.
    pub fn new(config: PlatformConfig) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PlatformError::Unavailable {
                endpoint: "client".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            http,
            config,
            base_url,
            token: TokenCache::new(),
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// The normalized base URL.
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn token(&self) -> &TokenCache {
        &self.token
    }
}
