//! Platform client error types.

use credrail_core::ConfigError;

/// Errors from credential platform calls.
///
/// `code()` gives the stable machine-readable form that orchestrators
/// preserve on failed phase transitions and the API returns in error
/// envelopes.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// Required configuration is missing; detected before any call.
    #[error("platform misconfigured: {0}")]
    Misconfigured(#[from] ConfigError),

    /// Transport failure or timeout talking to the platform.
    #[error("platform unavailable calling {endpoint}: {reason}")]
    Unavailable {
        /// The endpoint that was being called.
        endpoint: String,
        /// Transport-level failure description.
        reason: String,
    },

    /// The platform returned a structured business error.
    #[error("platform rejected {endpoint} with HTTP {status}: {body}")]
    Rejected {
        /// The endpoint that was called.
        endpoint: String,
        /// HTTP status returned.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// Authentication failed even after one transparent re-authentication.
    #[error("platform authentication failed calling {endpoint}")]
    Unauthorized {
        /// The endpoint that was called.
        endpoint: String,
    },

    /// The credential definition is unknown to the platform.
    #[error("credential definition {cred_def_id} not found on the platform")]
    CredentialDefinitionNotFound {
        /// The credential-definition id that was submitted.
        cred_def_id: String,
    },

    /// The platform rejected the payload against its schema.
    #[error("platform validation rejected {endpoint}: {detail}")]
    ValidationRejected {
        /// The endpoint that was called.
        endpoint: String,
        /// Platform-reported validation detail.
        detail: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to deserialize response from {endpoint}: {reason}")]
    Deserialization {
        /// The endpoint that was called.
        endpoint: String,
        /// Parser failure description.
        reason: String,
    },
}

impl PlatformError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Misconfigured(_) => "UPSTREAM_MISCONFIGURED",
            Self::Unavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::Rejected { .. } => "UPSTREAM_REJECTED",
            Self::Unauthorized { .. } => "UPSTREAM_UNAUTHORIZED",
            Self::CredentialDefinitionNotFound { .. } => "CRED_DEF_NOT_FOUND",
            Self::ValidationRejected { .. } => "UPSTREAM_VALIDATION_REJECTED",
            Self::Deserialization { .. } => "UPSTREAM_MALFORMED_RESPONSE",
        }
    }

    /// Whether a retry with backoff could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Whether the failure is plausibly a deployment misconfiguration,
    /// worth a configuration hint in user-facing messages.
    pub fn is_configuration_hint(&self) -> bool {
        matches!(
            self,
            Self::Misconfigured(_) | Self::CredentialDefinitionNotFound { .. }
        )
    }
}
