//! Wire types for the credential platform API.
//!
//! The platform speaks camelCase JSON; every DTO here carries the rename so
//! the Rust side stays snake_case.

use serde::{Deserialize, Serialize};

/// One attribute offered on a credential, or requested in a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialAttribute {
    /// Attribute name as published in the schema.
    pub name: String,
    /// Attribute value. Must be a non-empty string on the wire.
    pub value: String,
}

impl CredentialAttribute {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Restriction scoping a requested attribute to trusted issuers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRestriction {
    /// Accepted credential-definition id.
    pub cred_def_id: String,
}

/// One requested attribute with its restrictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedAttribute {
    /// Attribute name to disclose.
    pub name: String,
    /// Credential definitions that may satisfy it. Never empty — an
    /// unrestricted attribute would accept a presentation from any issuer.
    pub restrictions: Vec<AttributeRestriction>,
}

/// Body of `POST /orgs/{orgId}/proofs/request-outofband`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequestBody {
    /// The attributes to request from the holder.
    pub requested_attributes: Vec<RequestedAttribute>,
    /// Free-form comment shown in the holder's wallet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Response of the proof request endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequestResponse {
    /// Platform-assigned proof identifier.
    pub proof_id: String,
    /// Out-of-band invitation for the holder's wallet (QR payload).
    #[serde(default)]
    pub invitation_payload: serde_json::Value,
}

/// Response of the proof status endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofStatusResponse {
    /// Platform-reported status string (`requested`, `pending`, `done`,
    /// `verified`, `failed`, …).
    pub status: String,
    /// Proof detail: an array of credential bags once presented. Absent or
    /// null while the exchange is in flight.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Body of `POST /orgs/{orgId}/credentials/offer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionOfferBody {
    /// The wallet connection to deliver over.
    pub connection_id: String,
    /// Credential definition to issue against.
    pub cred_def_id: String,
    /// Attribute values for the credential.
    pub attributes: Vec<CredentialAttribute>,
}

/// Body of `POST /orgs/{orgId}/credentials/oob/email`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailOfferBody {
    /// Recipient email address.
    pub email: String,
    /// Credential definition to issue against.
    pub cred_def_id: String,
    /// Attribute values for the credential.
    pub attributes: Vec<CredentialAttribute>,
}

/// Response of both issuance endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceResponse {
    /// Platform-assigned credential identifier.
    pub credential_id: String,
    /// Invitation URL for out-of-band acceptance.
    #[serde(default)]
    pub invitation_url: Option<String>,
    /// Wallet deep link.
    #[serde(default)]
    pub deep_link_url: Option<String>,
}

/// Body of the token endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenRequestBody<'a> {
    pub api_key: &'a str,
}

/// Response of the token endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_request_body_serializes_camel_case() {
        let body = ProofRequestBody {
            requested_attributes: vec![RequestedAttribute {
                name: "surname".to_string(),
                restrictions: vec![AttributeRestriction {
                    cred_def_id: "cd-1".to_string(),
                }],
            }],
            comment: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("requestedAttributes").is_some());
        assert_eq!(
            json["requestedAttributes"][0]["restrictions"][0]["credDefId"],
            serde_json::json!("cd-1")
        );
        assert!(json.get("comment").is_none());
    }

    #[test]
    fn test_issuance_response_tolerates_missing_urls() {
        let resp: IssuanceResponse =
            serde_json::from_value(serde_json::json!({"credentialId": "cred-1"})).unwrap();
        assert_eq!(resp.credential_id, "cred-1");
        assert!(resp.invitation_url.is_none());
        assert!(resp.deep_link_url.is_none());
    }

    #[test]
    fn test_proof_status_response_tolerates_missing_data() {
        let resp: ProofStatusResponse =
            serde_json::from_value(serde_json::json!({"status": "pending"})).unwrap();
        assert_eq!(resp.status, "pending");
        assert!(resp.data.is_null());
    }
}
