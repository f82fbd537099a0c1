//! # Platform Configuration
//!
//! Explicit configuration for the external credential platform, threaded
//! into the gateways at construction time. There are no implicit fallback
//! chains: a missing organization id or credential-definition id surfaces as
//! a dedicated misconfiguration error before any network call is attempted,
//! with the environment variable named in the message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default per-request timeout for platform calls, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default substitute for attribute values the platform would reject.
pub const DEFAULT_ATTRIBUTE_VALUE: &str = "N/A";

/// Configuration errors detected before any platform call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required configuration value is unset or empty.
    #[error("missing configuration: {name} is not set (set {env_var})")]
    Missing {
        /// Logical name of the configuration value.
        name: &'static str,
        /// Environment variable that supplies it.
        env_var: &'static str,
    },

    /// A configuration value is present but unusable.
    #[error("invalid configuration: {name}: {reason}")]
    Invalid {
        /// Logical name of the configuration value.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Credential-definition identifiers for each enrollment phase.
///
/// These scope proof requests to trusted issuers and select which credential
/// the issuance gateway offers. Each is issued by the platform operator when
/// the credential definition is published; an empty id means the deployment
/// has not been configured for that phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDefinitions {
    /// Registration credential (phase 1).
    pub registration: String,
    /// Mobilization call-up credential (phase 2).
    pub mobilization: String,
    /// Service credential (phase 3).
    pub service: String,
    /// Discharge certificate (phase 4).
    pub discharge: String,
}

/// Configuration for the external credential platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL of the platform API (e.g. `https://platform.example.com/api/v1`).
    pub base_url: String,
    /// Organization identifier assigned by the platform.
    pub org_id: String,
    /// API key exchanged for a bearer token.
    pub api_key: String,
    /// Per-phase credential-definition identifiers.
    pub cred_defs: CredentialDefinitions,
    /// Substitute for empty attribute values on issuance.
    pub attribute_default: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// When true, a phase whose prerequisite phases are incomplete is
    /// rejected; when false the gap is logged and issuance proceeds.
    pub strict_prerequisites: bool,
}

impl PlatformConfig {
    /// Create a configuration with defaults for the optional fields.
    pub fn new(
        base_url: impl Into<String>,
        org_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            org_id: org_id.into(),
            api_key: api_key.into(),
            cred_defs: CredentialDefinitions::default(),
            attribute_default: DEFAULT_ATTRIBUTE_VALUE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            strict_prerequisites: false,
        }
    }

    /// Load the configuration from `CREDRAIL_*` environment variables.
    ///
    /// `CREDRAIL_PLATFORM_URL`, `CREDRAIL_ORG_ID`, and `CREDRAIL_API_KEY`
    /// are required. Credential-definition ids, the attribute default, the
    /// timeout, and strict prerequisite enforcement are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = require_env("platform base URL", "CREDRAIL_PLATFORM_URL")?;
        let org_id = require_env("organization id", "CREDRAIL_ORG_ID")?;
        let api_key = require_env("API key", "CREDRAIL_API_KEY")?;

        let timeout_secs = match std::env::var("CREDRAIL_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: "timeout",
                reason: format!("CREDRAIL_TIMEOUT_SECS={raw:?} is not a number: {e}"),
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url,
            org_id,
            api_key,
            cred_defs: CredentialDefinitions {
                registration: optional_env("CREDRAIL_CRED_DEF_REGISTRATION"),
                mobilization: optional_env("CREDRAIL_CRED_DEF_MOBILIZATION"),
                service: optional_env("CREDRAIL_CRED_DEF_SERVICE"),
                discharge: optional_env("CREDRAIL_CRED_DEF_DISCHARGE"),
            },
            attribute_default: std::env::var("CREDRAIL_ATTRIBUTE_DEFAULT")
                .unwrap_or_else(|_| DEFAULT_ATTRIBUTE_VALUE.to_string()),
            timeout_secs,
            strict_prerequisites: std::env::var("CREDRAIL_STRICT_PREREQUISITES")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        })
    }

    /// The organization id, or a misconfiguration error when unset.
    pub fn require_org_id(&self) -> Result<&str, ConfigError> {
        if self.org_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                name: "organization id",
                env_var: "CREDRAIL_ORG_ID",
            });
        }
        Ok(&self.org_id)
    }

    /// Validate a credential-definition id before it reaches the platform.
    pub fn require_cred_def<'a>(
        &self,
        name: &'static str,
        env_var: &'static str,
        value: &'a str,
    ) -> Result<&'a str, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::Missing { name, env_var });
        }
        Ok(value)
    }
}

fn require_env(name: &'static str, env_var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing { name, env_var }),
    }
}

fn optional_env(env_var: &str) -> String {
    std::env::var(env_var).unwrap_or_default()
}
