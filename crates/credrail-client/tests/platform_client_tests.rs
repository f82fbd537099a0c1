//! # Integration Tests for the Platform Client
//!
//! Exercises the proof and issuance gateways against wiremock servers to
//! verify request construction, authentication behavior, response parsing,
//! and error mapping without a live credential platform.

use credrail_client::{CredentialAttribute, PlatformClient, PlatformError};
use credrail_core::{PlatformConfig, ProofId};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn make_client(server: &MockServer) -> PlatformClient {
    let mut config = PlatformConfig::new(server.uri(), "org-1", "test-api-key");
    config.cred_defs.registration = "cd-reg".to_string();
    PlatformClient::new(config).expect("client build")
}

async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "accessToken": token })),
        )
        .mount(server)
        .await;
}

// ── Authentication ───────────────────────────────────────────────────────

#[tokio::test]
async fn token_is_acquired_and_attached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(body_json(serde_json::json!({ "apiKey": "test-api-key" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "accessToken": "tok-1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/orgs/org-1/proofs/request-outofband"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "proofId": "proof-001",
            "invitationPayload": { "url": "didcomm://example" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = make_client(&server);
    let receipt = client
        .request_proof(&["surname", "national_id_number"], "cd-reg", None)
        .await
        .expect("proof request");

    assert_eq!(receipt.proof_id, ProofId::new("proof-001"));
    assert_eq!(
        receipt.invitation_payload["url"],
        serde_json::json!("didcomm://example")
    );
}

#[tokio::test]
async fn token_is_cached_across_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "accessToken": "tok-1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orgs/org-1/proofs/proof-001"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "pending" })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = make_client(&server);
    let proof = ProofId::new("proof-001");
    client.get_proof(&proof).await.expect("first poll");
    client.get_proof(&proof).await.expect("second poll");
}

#[tokio::test]
async fn reauthenticates_exactly_once_on_401() {
    let server = MockServer::start().await;

    // First token request yields a stale token, the second a fresh one.
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "accessToken": "tok-stale" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "accessToken": "tok-fresh" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orgs/org-1/proofs/proof-001"))
        .and(header("Authorization", "Bearer tok-stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orgs/org-1/proofs/proof-001"))
        .and(header("Authorization", "Bearer tok-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "done",
            "data": [{ "surname": "Doe", "schemaId": "s1", "credDefId": "cd-reg" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = make_client(&server);
    let detail = client
        .get_proof(&ProofId::new("proof-001"))
        .await
        .expect("poll after re-auth");
    assert_eq!(detail.status, "done");
}

#[tokio::test]
async fn persistent_401_surfaces_unauthorized() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    // Two attempts only: the original call and the single re-auth retry.
    Mock::given(method("GET"))
        .and(path("/orgs/org-1/proofs/proof-001"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let client = make_client(&server);
    let err = client
        .get_proof(&ProofId::new("proof-001"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, PlatformError::Unauthorized { .. }));
    assert_eq!(err.code(), "UPSTREAM_UNAUTHORIZED");
}

// ── Misconfiguration is caught before any call ───────────────────────────

#[tokio::test]
async fn missing_org_id_fails_before_any_call() {
    let server = MockServer::start().await;
    let config = PlatformConfig::new(server.uri(), "", "test-api-key");
    let client = PlatformClient::new(config).expect("client build");

    let err = client
        .request_proof(&["surname"], "cd-reg", None)
        .await
        .expect_err("must fail");
    assert_eq!(err.code(), "UPSTREAM_MISCONFIGURED");
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn empty_cred_def_fails_before_any_call() {
    let server = MockServer::start().await;
    let client = make_client(&server);

    let err = client
        .request_proof(&["surname"], "", None)
        .await
        .expect_err("must fail");
    assert_eq!(err.code(), "UPSTREAM_MISCONFIGURED");

    let err = client
        .issue_by_connection("conn-1", "", vec![])
        .await
        .expect_err("must fail");
    assert_eq!(err.code(), "UPSTREAM_MISCONFIGURED");
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

// ── Proof polling ────────────────────────────────────────────────────────

#[tokio::test]
async fn get_proof_returns_status_and_bags() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/orgs/org-1/proofs/proof-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "verified",
            "data": [
                { "surname": "Doe", "schemaId": "s1", "credDefId": "cd-reg" },
                {
                    "othernames": { "raw": "Jane" },
                    "national_id_number": "12345678901",
                    "schemaId": "s2",
                    "credDefId": "cd-reg"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = make_client(&server);
    let detail = client
        .get_proof(&ProofId::new("proof-001"))
        .await
        .expect("poll");
    assert_eq!(detail.status, "verified");
    assert!(detail.raw_detail.is_array());
    assert_eq!(detail.raw_detail.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_proof_maps_to_rejected() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/orgs/org-1/proofs/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = make_client(&server);
    let err = client
        .get_proof(&ProofId::new("ghost"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, PlatformError::Rejected { status: 404, .. }));
}

// ── Issuance ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn issuance_substitutes_default_for_empty_values() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    // The offer body on the wire must carry "N/A", never an empty string.
    Mock::given(method("POST"))
        .and(path("/orgs/org-1/credentials/offer"))
        .and(body_json(serde_json::json!({
            "connectionId": "conn-1",
            "credDefId": "cd-reg",
            "attributes": [
                { "name": "surname", "value": "Doe" },
                { "name": "othernames", "value": "N/A" },
                { "name": "national_id_number", "value": "12345678901" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "credentialId": "cred-001",
            "invitationUrl": "https://platform.example/i/cred-001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = make_client(&server);
    let receipt = client
        .issue_by_connection(
            "conn-1",
            "cd-reg",
            vec![
                CredentialAttribute::new("surname", "Doe"),
                CredentialAttribute::new("othernames", ""),
                CredentialAttribute::new("national_id_number", "12345678901"),
            ],
        )
        .await
        .expect("offer");

    assert_eq!(receipt.credential_id, "cred-001");
    assert_eq!(
        receipt.invitation_url.as_deref(),
        Some("https://platform.example/i/cred-001")
    );
}

#[tokio::test]
async fn issuance_substitutes_default_for_null_and_undefined_literals() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/orgs/org-1/credentials/oob/email"))
        .and(body_json(serde_json::json!({
            "email": "jane@example.com",
            "credDefId": "cd-reg",
            "attributes": [
                { "name": "othernames", "value": "N/A" },
                { "name": "phone", "value": "N/A" }
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "credentialId": "cred-002" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = make_client(&server);
    let receipt = client
        .issue_by_email(
            "jane@example.com",
            "cd-reg",
            vec![
                CredentialAttribute::new("othernames", "null"),
                CredentialAttribute::new("phone", "undefined"),
            ],
        )
        .await
        .expect("offer");
    assert_eq!(receipt.credential_id, "cred-002");
}

#[tokio::test]
async fn unknown_cred_def_maps_404() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/orgs/org-1/credentials/offer"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = make_client(&server);
    let err = client
        .issue_by_connection("conn-1", "cd-ghost", vec![])
        .await
        .expect_err("must fail");
    match err {
        PlatformError::CredentialDefinitionNotFound { cred_def_id } => {
            assert_eq!(cred_def_id, "cd-ghost");
        }
        other => panic!("expected CredentialDefinitionNotFound, got: {other}"),
    }
}

#[tokio::test]
async fn schema_mismatch_maps_validation_rejected() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("POST"))
        .and(path("/orgs/org-1/credentials/offer"))
        .respond_with(
            ResponseTemplate::new(422).set_body_string("attribute not in schema: callup_number"),
        )
        .mount(&server)
        .await;

    let client = make_client(&server);
    let err = client
        .issue_by_connection(
            "conn-1",
            "cd-reg",
            vec![CredentialAttribute::new("callup_number", "C-1")],
        )
        .await
        .expect_err("must fail");
    match err {
        PlatformError::ValidationRejected { detail, .. } => {
            assert!(detail.contains("callup_number"));
        }
        other => panic!("expected ValidationRejected, got: {other}"),
    }
}

// ── Transport failures ───────────────────────────────────────────────────

#[tokio::test]
async fn server_error_maps_unavailable() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;

    Mock::given(method("GET"))
        .and(path("/orgs/org-1/proofs/proof-001"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = make_client(&server);
    let err = client
        .get_proof(&ProofId::new("proof-001"))
        .await
        .expect_err("must fail");
    assert_eq!(err.code(), "UPSTREAM_UNAVAILABLE");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn connection_refused_maps_unavailable() {
    // Port 1 on loopback is guaranteed closed.
    let mut config = PlatformConfig::new("http://127.0.0.1:1", "org-1", "test-api-key");
    config.timeout_secs = 1;
    let client = PlatformClient::new(config).expect("client build");

    let err = client
        .get_proof(&ProofId::new("proof-001"))
        .await
        .expect_err("must fail");
    assert_eq!(err.code(), "UPSTREAM_UNAVAILABLE");
}
