//! # Proof Gateway
//!
//! Requests out-of-band proof presentations and polls their status.
//!
//! Every requested attribute is scoped to a credential-definition
//! restriction — an unrestricted request would let a holder satisfy it
//! with an attribute from any issuer's credential, which defeats the point
//! of verification. A missing organization id or credential-definition id
//! is caught here, before the request leaves the process.

use credrail_core::ProofId;

use crate::auth::send_authorized;
use crate::error::PlatformError;
use crate::types::{
    AttributeRestriction, ProofRequestBody, ProofRequestResponse, ProofStatusResponse,
    RequestedAttribute,
};
use crate::PlatformClient;

/// Result of a successful proof request.
#[derive(Debug, Clone)]
pub struct ProofRequestReceipt {
    /// Platform-assigned proof identifier.
    pub proof_id: ProofId,
    /// Out-of-band invitation payload for the holder's wallet.
    pub invitation_payload: serde_json::Value,
}

/// Result of a status poll.
#[derive(Debug, Clone)]
pub struct ProofStatusDetail {
    /// Platform-reported status string.
    pub status: String,
    /// Raw proof detail (array of credential bags once presented).
    pub raw_detail: serde_json::Value,
}

impl PlatformClient {
    /// Request a proof presentation for the given attributes, each
    /// restricted to `cred_def_id`.
    pub async fn request_proof(
        &self,
        attribute_names: &[&str],
        cred_def_id: &str,
        comment: Option<String>,
    ) -> Result<ProofRequestReceipt, PlatformError> {
        let org_id = self.config().require_org_id()?;
        if cred_def_id.trim().is_empty() {
            return Err(credrail_core::ConfigError::Invalid {
                name: "credential definition",
                reason: "empty credential-definition id in proof restrictions".to_string(),
            }
            .into());
        }

        let endpoint = format!("{}/orgs/{}/proofs/request-outofband", self.base_url(), org_id);
        let body = ProofRequestBody {
            requested_attributes: attribute_names
                .iter()
                .map(|name| RequestedAttribute {
                    name: (*name).to_string(),
                    restrictions: vec![AttributeRestriction {
                        cred_def_id: cred_def_id.to_string(),
                    }],
                })
                .collect(),
            comment,
        };

        tracing::debug!(endpoint, attributes = attribute_names.len(), "requesting proof");
        let resp = send_authorized(self, &endpoint, |token| {
            self.http().post(&endpoint).bearer_auth(token).json(&body)
        })
        .await?;

        if resp.status().is_client_error() {
            let status = resp.status().as_u16();
            let detail = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Rejected {
                endpoint,
                status,
                body: detail,
            });
        }

        let parsed: ProofRequestResponse =
            resp.json()
                .await
                .map_err(|e| PlatformError::Deserialization {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })?;

        Ok(ProofRequestReceipt {
            proof_id: ProofId::new(parsed.proof_id),
            invitation_payload: parsed.invitation_payload,
        })
    }

    /// Poll the status and detail of a proof exchange.
    pub async fn get_proof(&self, proof_id: &ProofId) -> Result<ProofStatusDetail, PlatformError> {
        let org_id = self.config().require_org_id()?;
        let endpoint = format!(
            "{}/orgs/{}/proofs/{}",
            self.base_url(),
            org_id,
            proof_id.as_str()
        );

        let resp = send_authorized(self, &endpoint, |token| {
            self.http().get(&endpoint).bearer_auth(token)
        })
        .await?;

        if resp.status().as_u16() == 404 {
            return Err(PlatformError::Rejected {
                endpoint,
                status: 404,
                body: format!("proof {} not found", proof_id.as_str()),
            });
        }
        if resp.status().is_client_error() {
            let status = resp.status().as_u16();
            let detail = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Rejected {
                endpoint,
                status,
                body: detail,
            });
        }

        let parsed: ProofStatusResponse =
            resp.json()
                .await
                .map_err(|e| PlatformError::Deserialization {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })?;

        tracing::debug!(proof = %proof_id, status = %parsed.status, "proof status polled");
        Ok(ProofStatusDetail {
            status: parsed.status,
            raw_detail: parsed.data,
        })
    }
}
