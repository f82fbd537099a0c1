//! # End-to-End API Tests
//!
//! Drives the assembled router with `tower::ServiceExt::oneshot` against a
//! wiremock credential platform: session lifecycle, proof polling, phase
//! orchestration (including the idempotent replay), the response envelope,
//! and authentication.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use credrail_api::{app, AppState};
use credrail_client::PlatformClient;
use credrail_core::PlatformConfig;

// ── Harness ──────────────────────────────────────────────────────────────

fn make_config(server: &MockServer) -> PlatformConfig {
    let mut config = PlatformConfig::new(server.uri(), "org-1", "test-api-key");
    config.cred_defs.registration = "cd-reg".to_string();
    config.cred_defs.mobilization = "cd-mob".to_string();
    config.cred_defs.service = "cd-svc".to_string();
    config.cred_defs.discharge = "cd-dis".to_string();
    config
}

fn make_state(server: &MockServer, auth_token: Option<&str>) -> AppState {
    let config = make_config(server);
    let client = PlatformClient::new(config.clone()).expect("client build");
    AppState::new(config, client, None, auth_token.map(str::to_string))
}

async fn call(
    state: &AppState,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
    token: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "accessToken": "tok-1" })),
        )
        .mount(server)
        .await;
}

async fn mount_proof_request(server: &MockServer, proof_id: &str) {
    Mock::given(method("POST"))
        .and(path("/orgs/org-1/proofs/request-outofband"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "proofId": proof_id,
            "invitationPayload": { "url": "didcomm://invite" }
        })))
        .mount(server)
        .await;
}

async fn mount_proof_detail(server: &MockServer, proof_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/orgs/org-1/proofs/{proof_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Two-bag proof detail with the full identity triple.
fn verified_detail() -> serde_json::Value {
    serde_json::json!({
        "status": "done",
        "data": [
            { "surname": "Doe", "schemaId": "s1", "credDefId": "cd-reg" },
            {
                "othernames": { "raw": "Jane" },
                "national_id_number": "12345678901",
                "schemaId": "s2",
                "credDefId": "cd-reg"
            }
        ]
    })
}

/// Create a session over the API and return its id.
async fn create_session(state: &AppState) -> String {
    let (status, body) = call(state, "POST", "/v1/sessions", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    body["data"]["session_id"].as_str().unwrap().to_string()
}

/// Attach a wallet connection to a session over the API.
async fn connect_session(state: &AppState, session_id: &str, connection_id: &str) {
    let (status, body) = call(
        state,
        "POST",
        &format!("/v1/sessions/{session_id}/connection"),
        Some(serde_json::json!({ "connection_id": connection_id })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "attach failed: {body}");
}

/// Request a proof over the API and return the proof id.
async fn request_proof(state: &AppState, session_id: &str, phase: &str) -> String {
    let (status, body) = call(
        state,
        "POST",
        "/v1/proofs/request",
        Some(serde_json::json!({ "session_id": session_id, "phase": phase })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "proof request failed: {body}");
    body["data"]["proof_id"].as_str().unwrap().to_string()
}

// ── Health and envelope ──────────────────────────────────────────────────

#[tokio::test]
async fn liveness_probe_is_open() {
    let server = MockServer::start().await;
    let state = make_state(&server, Some("secret"));
    let request = Request::builder()
        .uri("/health/liveness")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn success_envelope_shape() {
    let server = MockServer::start().await;
    let state = make_state(&server, None);
    let (status, body) = call(&state, "POST", "/v1/sessions", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "PENDING");
    assert!(body["data"]["session_id"].as_str().is_some());
}

#[tokio::test]
async fn failure_envelope_shape() {
    let server = MockServer::start().await;
    let state = make_state(&server, None);
    let missing = uuid::Uuid::new_v4();
    let (status, body) = call(&state, "GET", &format!("/v1/sessions/{missing}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["description"].as_str().is_some());
}

#[tokio::test]
async fn malformed_session_id_is_400() {
    let server = MockServer::start().await;
    let state = make_state(&server, None);
    let (status, body) = call(&state, "GET", "/v1/sessions/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// ── Authentication ───────────────────────────────────────────────────────

#[tokio::test]
async fn api_requires_bearer_token_when_configured() {
    let server = MockServer::start().await;
    let state = make_state(&server, Some("secret"));

    let (status, body) = call(&state, "POST", "/v1/sessions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = call(&state, "POST", "/v1/sessions", None, Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&state, "POST", "/v1/sessions", None, Some("secret")).await;
    assert_eq!(status, StatusCode::OK);
}

// ── Session lifecycle ────────────────────────────────────────────────────

#[tokio::test]
async fn attach_connection_is_idempotent_and_rejects_conflicts() {
    let server = MockServer::start().await;
    let state = make_state(&server, None);
    let session_id = create_session(&state).await;

    connect_session(&state, &session_id, "conn-1").await;
    // Same connection id again: still success, one binding.
    connect_session(&state, &session_id, "conn-1").await;

    let (status, body) = call(
        &state,
        "POST",
        &format!("/v1/sessions/{session_id}/connection"),
        Some(serde_json::json!({ "connection_id": "conn-2" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, body) = call(&state, "GET", &format!("/v1/sessions/{session_id}"), None, None).await;
    assert_eq!(body["data"]["connection_id"], "conn-1");
    assert_eq!(body["data"]["status"], "CONNECTED");
}

// ── Proof flow ───────────────────────────────────────────────────────────

#[tokio::test]
async fn proof_poll_returns_normalized_attributes_at_terminal_success() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_proof_request(&server, "proof-001").await;
    mount_proof_detail(&server, "proof-001", verified_detail()).await;

    let state = make_state(&server, None);
    let session_id = create_session(&state).await;
    let proof_id = request_proof(&state, &session_id, "registration").await;
    assert_eq!(proof_id, "proof-001");

    let (status, body) = call(&state, "GET", "/v1/proofs/proof-001", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "DONE");
    assert_eq!(body["data"]["verified"], true);
    let attrs = &body["data"]["attributes"];
    assert_eq!(attrs["surname"], "Doe");
    assert_eq!(attrs["othernames"], "Jane");
    assert_eq!(attrs["national_id_number"], "12345678901");
    assert!(attrs.get("schemaId").is_none());
    assert!(attrs.get("credDefId").is_none());
}

#[tokio::test]
async fn unknown_proof_is_404() {
    let server = MockServer::start().await;
    let state = make_state(&server, None);
    let (status, body) = call(&state, "GET", "/v1/proofs/ghost", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn unset_cred_def_fails_with_configuration_hint() {
    let server = MockServer::start().await;
    let mut config = make_config(&server);
    config.cred_defs.mobilization = String::new();
    let client = PlatformClient::new(config.clone()).expect("client build");
    let state = AppState::new(config, client, None, None);

    let session_id = create_session(&state).await;
    let (status, body) = call(
        &state,
        "POST",
        "/v1/proofs/request",
        Some(serde_json::json!({ "session_id": session_id, "phase": "mobilization" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "UPSTREAM_MISCONFIGURED");
    assert!(body["error"]["description"]
        .as_str()
        .unwrap()
        .contains("CREDRAIL_CRED_DEF_MOBILIZATION"));
    assert!(body["error"]["details"]["hint"].as_str().is_some());
}

// ── Phase orchestration ──────────────────────────────────────────────────

#[tokio::test]
async fn registration_phase_completes_end_to_end() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_proof_request(&server, "proof-001").await;
    mount_proof_detail(&server, "proof-001", verified_detail()).await;
    Mock::given(method("POST"))
        .and(path("/orgs/org-1/credentials/offer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "credentialId": "cred-001",
            "invitationUrl": "https://platform.example/i/cred-001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = make_state(&server, None);
    let session_id = create_session(&state).await;
    connect_session(&state, &session_id, "conn-1").await;
    let proof_id = request_proof(&state, &session_id, "registration").await;

    let (status, body) = call(
        &state,
        "POST",
        "/v1/enrollment/registration/complete",
        Some(serde_json::json!({ "session_id": session_id, "proof_id": proof_id })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK, "completion failed: {body}");
    let data = &body["data"];
    assert_eq!(data["state"], "ISSUED");
    assert_eq!(data["already_issued"], false);
    assert_eq!(data["credential_id"], "cred-001");
    assert_eq!(data["subject_key"], "nin:12345678901");
    assert_eq!(data["workflow_status"], "REGISTERED");
    assert_eq!(data["attributes"]["surname"], "Doe");
    assert_eq!(data["attributes"]["othernames"], "Jane");

    // The workflow record is queryable by national id.
    let (status, body) = call(
        &state,
        "GET",
        "/v1/enrollment/records/12345678901",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["registration"]["issued"], true);
    assert_eq!(body["data"]["registration"]["credential_id"], "cred-001");
    assert_eq!(body["data"]["surname"], "Doe");
}

#[tokio::test]
async fn placeholder_national_id_fails_with_missing_attributes() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_proof_request(&server, "proof-002").await;
    mount_proof_detail(
        &server,
        "proof-002",
        serde_json::json!({
            "status": "done",
            "data": [
                { "surname": "Doe", "schemaId": "s1", "credDefId": "cd-reg" },
                {
                    "othernames": { "raw": "Jane" },
                    "national_id_number": "00000000000",
                    "schemaId": "s2",
                    "credDefId": "cd-reg"
                }
            ]
        }),
    )
    .await;

    let state = make_state(&server, None);
    let session_id = create_session(&state).await;
    connect_session(&state, &session_id, "conn-1").await;
    let proof_id = request_proof(&state, &session_id, "registration").await;

    let (status, body) = call(
        &state,
        "POST",
        "/v1/enrollment/registration/complete",
        Some(serde_json::json!({ "session_id": session_id, "proof_id": proof_id })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_ATTRIBUTES");
    assert!(body["error"]["description"]
        .as_str()
        .unwrap()
        .contains("national_id_number"));
    assert_eq!(body["error"]["details"]["missing"][0], "national_id_number");
}

#[tokio::test]
async fn double_completion_issues_exactly_once() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_proof_request(&server, "proof-003").await;
    mount_proof_detail(&server, "proof-003", verified_detail()).await;
    // The offer endpoint may be hit exactly once across both completions.
    Mock::given(method("POST"))
        .and(path("/orgs/org-1/credentials/offer"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "credentialId": "cred-001" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let state = make_state(&server, None);
    let session_id = create_session(&state).await;
    connect_session(&state, &session_id, "conn-1").await;
    let proof_id = request_proof(&state, &session_id, "registration").await;

    let body_json =
        serde_json::json!({ "session_id": session_id, "proof_id": proof_id });

    let (status, first) = call(
        &state,
        "POST",
        "/v1/enrollment/registration/complete",
        Some(body_json.clone()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["already_issued"], false);

    let (status, second) = call(
        &state,
        "POST",
        "/v1/enrollment/registration/complete",
        Some(body_json),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["already_issued"], true);
    assert_eq!(second["data"]["credential_id"], "cred-001");
    assert_eq!(second["data"]["state"], "ISSUED");
}

#[tokio::test]
async fn pending_proof_cannot_complete_a_phase() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_proof_request(&server, "proof-004").await;
    mount_proof_detail(
        &server,
        "proof-004",
        serde_json::json!({ "status": "pending" }),
    )
    .await;

    let state = make_state(&server, None);
    let session_id = create_session(&state).await;
    connect_session(&state, &session_id, "conn-1").await;
    let proof_id = request_proof(&state, &session_id, "registration").await;

    let (status, body) = call(
        &state,
        "POST",
        "/v1/enrollment/registration/complete",
        Some(serde_json::json!({ "session_id": session_id, "proof_id": proof_id })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["description"]
        .as_str()
        .unwrap()
        .contains("not verified yet"));
}

#[tokio::test]
async fn unconnected_session_issues_out_of_band_by_email() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_proof_request(&server, "proof-005").await;
    mount_proof_detail(&server, "proof-005", verified_detail()).await;
    Mock::given(method("POST"))
        .and(path("/orgs/org-1/credentials/oob/email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "credentialId": "cred-oob-001",
            "invitationUrl": "https://platform.example/i/cred-oob-001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = make_state(&server, None);
    let session_id = create_session(&state).await;
    // No wallet connection attached.
    let proof_id = request_proof(&state, &session_id, "registration").await;

    let (status, body) = call(
        &state,
        "POST",
        "/v1/enrollment/registration/complete",
        Some(serde_json::json!({
            "session_id": session_id,
            "proof_id": proof_id,
            "email": "jane@example.com"
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "oob completion failed: {body}");
    assert_eq!(body["data"]["credential_id"], "cred-oob-001");
    assert_eq!(
        body["data"]["invitation_url"],
        "https://platform.example/i/cred-oob-001"
    );
}

#[tokio::test]
async fn unconnected_session_without_email_is_rejected() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_proof_request(&server, "proof-006").await;
    mount_proof_detail(&server, "proof-006", verified_detail()).await;

    let state = make_state(&server, None);
    let session_id = create_session(&state).await;
    let proof_id = request_proof(&state, &session_id, "registration").await;

    let (status, body) = call(
        &state,
        "POST",
        "/v1/enrollment/registration/complete",
        Some(serde_json::json!({ "session_id": session_id, "proof_id": proof_id })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["description"]
        .as_str()
        .unwrap()
        .contains("no wallet connection"));
}

#[tokio::test]
async fn later_phase_warns_but_issues_without_prerequisites_by_default() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_proof_request(&server, "proof-007").await;
    mount_proof_detail(&server, "proof-007", verified_detail()).await;
    Mock::given(method("POST"))
        .and(path("/orgs/org-1/credentials/offer"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "credentialId": "cred-svc-001" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let state = make_state(&server, None);
    let session_id = create_session(&state).await;
    connect_session(&state, &session_id, "conn-1").await;
    let proof_id = request_proof(&state, &session_id, "service").await;

    // Service phase with no registration or mobilization on record.
    let (status, body) = call(
        &state,
        "POST",
        "/v1/enrollment/service/complete",
        Some(serde_json::json!({ "session_id": session_id, "proof_id": proof_id })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "soft prerequisites: {body}");
    assert_eq!(body["data"]["credential_id"], "cred-svc-001");
}

#[tokio::test]
async fn strict_prerequisites_block_out_of_order_phases() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_proof_request(&server, "proof-008").await;
    mount_proof_detail(&server, "proof-008", verified_detail()).await;

    let mut config = make_config(&server);
    config.strict_prerequisites = true;
    let client = PlatformClient::new(config.clone()).expect("client build");
    let state = AppState::new(config, client, None, None);

    let session_id = create_session(&state).await;
    connect_session(&state, &session_id, "conn-1").await;
    let proof_id = request_proof(&state, &session_id, "service").await;

    let (status, body) = call(
        &state,
        "POST",
        "/v1/enrollment/service/complete",
        Some(serde_json::json!({ "session_id": session_id, "proof_id": proof_id })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "PREREQUISITES_INCOMPLETE");
    assert_eq!(
        body["error"]["details"]["missing_phases"][0],
        "REGISTRATION"
    );
}

// ── Admin reset ──────────────────────────────────────────────────────────

#[tokio::test]
async fn demo_reset_removes_all_records() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_proof_request(&server, "proof-009").await;
    mount_proof_detail(&server, "proof-009", verified_detail()).await;
    Mock::given(method("POST"))
        .and(path("/orgs/org-1/credentials/offer"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "credentialId": "cred-001" })),
        )
        .mount(&server)
        .await;

    let state = make_state(&server, None);
    let session_id = create_session(&state).await;
    connect_session(&state, &session_id, "conn-1").await;
    let proof_id = request_proof(&state, &session_id, "registration").await;
    let (status, _) = call(
        &state,
        "POST",
        "/v1/enrollment/registration/complete",
        Some(serde_json::json!({ "session_id": session_id, "proof_id": proof_id })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&state, "DELETE", "/v1/admin/demo-data", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["workflow_records_deleted"], 1);
    assert_eq!(body["data"]["sessions_deleted"], 1);
    assert_eq!(body["data"]["proofs_deleted"], 1);

    let (status, _) = call(
        &state,
        "GET",
        "/v1/enrollment/records/12345678901",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
