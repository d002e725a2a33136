//! Inbound token validation against the remote identity authority.
//!
//! The authority's verdict is consumed as-is; no signature checks happen here.
//! Every failure mode (transport, timeout, bad status, bad body) becomes
//! `Verdict::Invalid` so a broken authority can never be read as "allow".
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::services::auth::identity::{AuthenticatedIdentity, Identity, parse_roles};

/// Claims returned by the authority for a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub roles: std::collections::BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid(Claims),
    Invalid { reason: String },
}

impl Verdict {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// Build the request identity for `token` from this verdict.
    pub fn into_identity(self, token: &str) -> Identity {
        match self {
            Verdict::Valid(claims) => Identity::authenticated(AuthenticatedIdentity {
                user_id: claims.user_id,
                email: claims.email,
                display_name: claims.display_name,
                avatar_url: claims.avatar_url,
                roles: claims.roles,
                raw_token: Some(token.to_string()),
            }),
            Verdict::Invalid { .. } => Identity::unauthenticated(Some(token.to_string())),
        }
    }
}

#[async_trait]
pub trait TokenValidator: Send + Sync + 'static {
    /// Exactly one authority round-trip, no retries.
    async fn validate(&self, token: &str) -> Verdict;
}

/// Failures talking to the authority. Never leaves this module as an error:
/// callers only ever see `Verdict::Invalid`.
#[derive(Debug, Error)]
pub enum ValidationTransportError {
    #[error("identity authority unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("identity authority returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed identity authority response: {0}")]
    Malformed(#[source] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct ValidateTokenRequest<'a> {
    token: &'a str,
}

/// Wire format of the authority's answer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidateTokenResponse {
    pub is_valid: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub roles: Option<String>,
    pub message: Option<String>,
}

impl From<ValidateTokenResponse> for Verdict {
    fn from(res: ValidateTokenResponse) -> Self {
        if !res.is_valid {
            return Verdict::invalid(res.message.unwrap_or_else(|| "token rejected".into()));
        }

        let user_id = match res.user_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Verdict::invalid("authority accepted token without a user id"),
        };

        Verdict::Valid(Claims {
            user_id,
            email: non_empty(res.email),
            display_name: non_empty(res.full_name),
            avatar_url: non_empty(res.avatar_url),
            roles: res.roles.as_deref().map(parse_roles).unwrap_or_default(),
        })
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// HTTP/JSON client for the authority's validate endpoint.
#[derive(Clone, Debug)]
pub struct HttpTokenValidator {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTokenValidator {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    async fn call(&self, token: &str) -> Result<ValidateTokenResponse, ValidationTransportError> {
        let res = self
            .client
            .post(self.endpoint.clone())
            .json(&ValidateTokenRequest { token })
            .send()
            .await
            .map_err(ValidationTransportError::Transport)?;

        let status = res.status();
        if !status.is_success() {
            return Err(ValidationTransportError::Status(status));
        }

        res.json::<ValidateTokenResponse>()
            .await
            .map_err(ValidationTransportError::Malformed)
    }
}

#[async_trait]
impl TokenValidator for HttpTokenValidator {
    async fn validate(&self, token: &str) -> Verdict {
        match self.call(token).await {
            Ok(res) => {
                let verdict = Verdict::from(res);
                if let Verdict::Invalid { reason } = &verdict {
                    tracing::debug!(reason = %reason, "token rejected by identity authority");
                }
                verdict
            }
            Err(err) => {
                tracing::warn!(error = %err, "token validation failed; treating token as invalid");
                Verdict::invalid(format!("failed to validate token: {err}"))
            }
        }
    }
}
