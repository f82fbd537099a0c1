//! # Issuance Gateway
//!
//! Offers credentials over an existing wallet connection or out-of-band by
//! email.
//!
//! ## Attribute Sanitization
//!
//! The platform rejects offers carrying empty attribute values, and the
//! upstream form layers occasionally leak the literal strings `"null"` and
//! `"undefined"`. Every value is sanitized before the request: unusable
//! values are replaced with the configured default, so the wire never sees
//! an empty string.

use crate::auth::send_authorized;
use crate::error::PlatformError;
use crate::types::{ConnectionOfferBody, CredentialAttribute, EmailOfferBody, IssuanceResponse};
use crate::PlatformClient;

/// Result of a successful credential offer.
#[derive(Debug, Clone)]
pub struct IssuanceReceipt {
    /// Platform-assigned credential identifier.
    pub credential_id: String,
    /// Invitation URL for out-of-band acceptance.
    pub invitation_url: Option<String>,
    /// Wallet deep link.
    pub deep_link_url: Option<String>,
}

impl PlatformClient {
    /// Offer a credential over an existing wallet connection.
    pub async fn issue_by_connection(
        &self,
        connection_id: &str,
        cred_def_id: &str,
        attributes: Vec<CredentialAttribute>,
    ) -> Result<IssuanceReceipt, PlatformError> {
        let org_id = self.config().require_org_id()?;
        let cred_def_id = self.require_cred_def(cred_def_id)?;
        let endpoint = format!("{}/orgs/{}/credentials/offer", self.base_url(), org_id);
        let body = ConnectionOfferBody {
            connection_id: connection_id.to_string(),
            cred_def_id: cred_def_id.to_string(),
            attributes: self.sanitize_attributes(attributes),
        };
        self.submit_offer(&endpoint, cred_def_id, &body).await
    }

    /// Offer a credential out-of-band to an email address.
    pub async fn issue_by_email(
        &self,
        email: &str,
        cred_def_id: &str,
        attributes: Vec<CredentialAttribute>,
    ) -> Result<IssuanceReceipt, PlatformError> {
        let org_id = self.config().require_org_id()?;
        let cred_def_id = self.require_cred_def(cred_def_id)?;
        let endpoint = format!("{}/orgs/{}/credentials/oob/email", self.base_url(), org_id);
        let body = EmailOfferBody {
            email: email.to_string(),
            cred_def_id: cred_def_id.to_string(),
            attributes: self.sanitize_attributes(attributes),
        };
        self.submit_offer(&endpoint, cred_def_id, &body).await
    }

    /// Replace unusable attribute values with the configured default.
    pub fn sanitize_attributes(
        &self,
        attributes: Vec<CredentialAttribute>,
    ) -> Vec<CredentialAttribute> {
        let default = &self.config().attribute_default;
        attributes
            .into_iter()
            .map(|attr| {
                let trimmed = attr.value.trim();
                if trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("null")
                    || trimmed.eq_ignore_ascii_case("undefined")
                {
                    tracing::debug!(attribute = %attr.name, "substituting default for empty value");
                    CredentialAttribute {
                        name: attr.name,
                        value: default.clone(),
                    }
                } else {
                    attr
                }
            })
            .collect()
    }

    fn require_cred_def<'a>(&self, cred_def_id: &'a str) -> Result<&'a str, PlatformError> {
        if cred_def_id.trim().is_empty() {
            return Err(credrail_core::ConfigError::Invalid {
                name: "credential definition",
                reason: "empty credential-definition id in issuance request".to_string(),
            }
            .into());
        }
        Ok(cred_def_id)
    }

    async fn submit_offer<B: serde::Serialize>(
        &self,
        endpoint: &str,
        cred_def_id: &str,
        body: &B,
    ) -> Result<IssuanceReceipt, PlatformError> {
        tracing::debug!(endpoint, cred_def = cred_def_id, "submitting credential offer");
        let resp = send_authorized(self, endpoint, |token| {
            self.http().post(endpoint).bearer_auth(token).json(body)
        })
        .await?;

        match resp.status().as_u16() {
            404 => Err(PlatformError::CredentialDefinitionNotFound {
                cred_def_id: cred_def_id.to_string(),
            }),
            400 | 422 => {
                let detail = resp.text().await.unwrap_or_default();
                Err(PlatformError::ValidationRejected {
                    endpoint: endpoint.to_string(),
                    detail,
                })
            }
            status if (400..500).contains(&status) => {
                let detail = resp.text().await.unwrap_or_default();
                Err(PlatformError::Rejected {
                    endpoint: endpoint.to_string(),
                    status,
                    body: detail,
                })
            }
            _ => {
                let parsed: IssuanceResponse =
                    resp.json()
                        .await
                        .map_err(|e| PlatformError::Deserialization {
                            endpoint: endpoint.to_string(),
                            reason: e.to_string(),
                        })?;
                Ok(IssuanceReceipt {
                    credential_id: parsed.credential_id,
                    invitation_url: parsed.invitation_url,
                    deep_link_url: parsed.deep_link_url,
                })
            }
        }
    }
}
