//! # Authentication Middleware
//!
//! Bearer-token authentication for the API surface. The expected token
//! comes from `CREDRAIL_AUTH_TOKEN`; when unset, authentication is disabled
//! (development and demo mode) and a warning is logged at startup.
//!
//! Token comparison is constant-time via `subtle` so the middleware does
//! not leak prefix information through response timing. Health probes and
//! the metrics endpoint are mounted outside this middleware.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Authentication configuration shared via request extensions.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Expected bearer token; `None` disables authentication.
    pub token: Option<String>,
}

/// Middleware enforcing `Authorization: Bearer <token>` on API routes.
pub async fn auth_middleware(request: Request, next: Next) -> Response {
    let config = request.extensions().get::<AuthConfig>().cloned();
    let expected = match config.and_then(|c| c.token) {
        Some(token) => token,
        // No token configured — open mode.
        None => return next.run(request).await,
    };

    let presented = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if constant_time_eq(token, &expected) => next.run(request).await,
        Some(_) => AppError::Unauthorized("invalid bearer token".to_string()).into_response(),
        None => {
            AppError::Unauthorized("missing Authorization: Bearer header".to_string())
                .into_response()
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secrex"));
        assert!(!constant_time_eq("secret", "secre"));
        assert!(!constant_time_eq("", "secret"));
        assert!(constant_time_eq("", ""));
    }
}
