//! # Platform Authentication
//!
//! Bearer-token acquisition and caching. The platform exchanges the
//! configured API key for a short-lived access token; every other endpoint
//! expects `Authorization: Bearer <token>`.
//!
//! ## Retry Policy
//!
//! Exactly one transparent re-authentication: when an authorized call comes
//! back 401 the cached token is discarded, a fresh token is fetched, and
//! the call is retried once. A second 401 surfaces as
//! [`PlatformError::Unauthorized`] — anything more would mask a revoked key
//! behind an infinite loop.

use tokio::sync::Mutex;

use crate::error::PlatformError;
use crate::types::{TokenRequestBody, TokenResponse};
use crate::PlatformClient;

/// Cached bearer token, shared across concurrent requests.
#[derive(Debug, Default)]
pub struct TokenCache {
    token: Mutex<Option<String>>,
}

impl TokenCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached token, fetching a fresh one when absent.
    pub(crate) async fn bearer(&self, client: &PlatformClient) -> Result<String, PlatformError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let fresh = fetch_token(client).await?;
        *guard = Some(fresh.clone());
        Ok(fresh)
    }

    /// Discard the cached token (called on 401).
    pub(crate) async fn invalidate(&self) {
        *self.token.lock().await = None;
    }
}

/// Exchange the API key for an access token.
async fn fetch_token(client: &PlatformClient) -> Result<String, PlatformError> {
    let endpoint = format!("{}/auth/token", client.base_url());
    let body = TokenRequestBody {
        api_key: &client.config().api_key,
    };

    let resp = client
        .http()
        .post(&endpoint)
        .json(&body)
        .send()
        .await
        .map_err(|e| transport_error(&endpoint, &e))?;

    match resp.status().as_u16() {
        200 | 201 => {
            let token: TokenResponse =
                resp.json()
                    .await
                    .map_err(|e| PlatformError::Deserialization {
                        endpoint: endpoint.clone(),
                        reason: e.to_string(),
                    })?;
            tracing::debug!("acquired platform access token");
            Ok(token.access_token)
        }
        401 | 403 => Err(PlatformError::Unauthorized { endpoint }),
        status if status >= 500 => {
            let body = resp.text().await.unwrap_or_default();
            Err(PlatformError::Unavailable {
                endpoint,
                reason: format!("HTTP {status}: {body}"),
            })
        }
        status => {
            let body = resp.text().await.unwrap_or_default();
            Err(PlatformError::Rejected {
                endpoint,
                status,
                body,
            })
        }
    }
}

/// Send an authorized request, re-authenticating once on 401.
///
/// `build` constructs the request from a bearer token; it is invoked again
/// for the single retry so the body is rebuilt rather than cloned.
pub(crate) async fn send_authorized<F>(
    client: &PlatformClient,
    endpoint: &str,
    build: F,
) -> Result<reqwest::Response, PlatformError>
where
    F: Fn(&str) -> reqwest::RequestBuilder,
{
    let token = client.token().bearer(client).await?;
    let resp = build(&token)
        .send()
        .await
        .map_err(|e| transport_error(endpoint, &e))?;

    if resp.status().as_u16() != 401 {
        return check_server_health(endpoint, resp).await;
    }

    tracing::debug!(endpoint, "platform returned 401; re-authenticating once");
    client.token().invalidate().await;
    let token = client.token().bearer(client).await?;
    let retry = build(&token)
        .send()
        .await
        .map_err(|e| transport_error(endpoint, &e))?;

    if retry.status().as_u16() == 401 {
        return Err(PlatformError::Unauthorized {
            endpoint: endpoint.to_string(),
        });
    }
    check_server_health(endpoint, retry).await
}

/// Map 5xx responses to `Unavailable`; pass everything else through.
async fn check_server_health(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, PlatformError> {
    if resp.status().is_server_error() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        tracing::error!(endpoint, %status, "platform server error");
        return Err(PlatformError::Unavailable {
            endpoint: endpoint.to_string(),
            reason: format!("HTTP {status}: {body}"),
        });
    }
    Ok(resp)
}

fn transport_error(endpoint: &str, e: &reqwest::Error) -> PlatformError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    PlatformError::Unavailable {
        endpoint: endpoint.to_string(),
        reason,
    }
}
