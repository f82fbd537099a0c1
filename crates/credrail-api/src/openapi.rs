//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Bearer token authentication. Set via CREDRAIL_AUTH_TOKEN env var.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Credrail API — Credential Orchestration Layer",
        version = "0.3.7",
        description = "Orchestration service for a verifiable-credentials demo platform.\n\nProvides:\n- **Session tracking** for wallet connections\n- **Proof presentation** request and polling with attribute normalization\n- **Enrollment journey** orchestration: four phases of progressive credential issuance gated on previously verified credentials\n- **Workflow records** accumulating per-subject journey state\n- **Demo maintenance** (reset all demo records)\n\nAuthentication: Bearer token via `Authorization: Bearer <token>` header when `CREDRAIL_AUTH_TOKEN` is set. Health probes (`/health/*`) and `/metrics` are unauthenticated.",
        license(name = "BUSL-1.1"),
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::attach_connection,
        crate::routes::proofs::request_proof,
        crate::routes::proofs::get_proof_status,
        crate::routes::enrollment::complete_phase,
        crate::routes::enrollment::get_record,
        crate::routes::admin::reset_demo_data,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::sessions::CreateSessionRequest,
            crate::routes::sessions::AttachConnectionRequest,
            crate::routes::sessions::SessionResponse,
            crate::routes::proofs::RequestProofBody,
            crate::routes::proofs::ProofRequestedResponse,
            crate::routes::proofs::ProofStatusResponse,
            crate::routes::enrollment::CompletePhaseRequest,
            crate::routes::enrollment::PhaseOutcomeResponse,
            crate::routes::enrollment::PhaseCompletionResponse,
            crate::routes::enrollment::WorkflowRecordResponse,
            crate::routes::admin::ResetResponse,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "sessions", description = "Wallet connection session lifecycle"),
        (name = "proofs", description = "Proof presentation request and polling"),
        (name = "enrollment", description = "Enrollment journey orchestration and workflow records"),
        (name = "admin", description = "Demo maintenance operations"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router, serving the spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(
            spec.info.title,
            "Credrail API — Credential Orchestration Layer"
        );
        assert!(!spec.paths.paths.is_empty());
    }

    #[test]
    fn test_openapi_spec_has_core_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/v1/sessions",
            "/v1/sessions/{session_id}",
            "/v1/sessions/{session_id}/connection",
            "/v1/proofs/request",
            "/v1/proofs/{proof_id}",
            "/v1/enrollment/{phase}/complete",
            "/v1/enrollment/records/{subject}",
            "/v1/admin/demo-data",
        ] {
            assert!(
                spec.paths.paths.contains_key(path),
                "spec should contain {path}"
            );
        }
    }

    #[test]
    fn test_openapi_spec_has_security_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.as_ref().unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_spec_serializes_to_json() {
        let spec = ApiDoc::openapi();
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("openapi"));
        assert!(json.contains("bearer_auth"));
    }
}
