use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::services::auth::credentials::CredentialError;
use crate::services::auth::outbound::OutboundAuth;
use crate::services::users::{UserDirectory, UserLookup, UsersLookup};

/// HTTP client for the user service; calls carry machine credentials.
#[derive(Clone, Debug)]
pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: Url,
    auth: OutboundAuth,
}

#[derive(Debug, Error)]
enum SendError {
    #[error("failed to obtain service credentials: {0}")]
    Credentials(CredentialError),
    #[error("{0}")]
    Other(String),
}

impl SendError {
    fn credential_error(&self) -> Option<CredentialError> {
        match self {
            SendError::Credentials(err) => Some(err.clone()),
            SendError::Other(_) => None,
        }
    }
}

/// `.` and `..` are dropped by URL path normalization; an empty id names no user.
fn is_addressable(user_id: &str) -> bool {
    !matches!(user_id.trim(), "" | "." | "..")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetUsersRequest<'a> {
    user_ids: &'a [String],
}

impl HttpUserDirectory {
    pub fn new(base_url: Url, auth: OutboundAuth, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment
    /// (`/` inside a user id never reaches the user service as a separator).
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SendError::Other("user service url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, SendError> {
        let req = self.auth.authorize(req).await.map_err(SendError::Credentials)?;

        let res = req
            .send()
            .await
            .map_err(|e| SendError::Other(e.to_string()))?;

        let status = res.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            // The user service no longer accepts our token.
            self.auth.cache().invalidate().await;
        }
        if !status.is_success() {
            return Err(SendError::Other(format!("user service returned status {status}")));
        }

        res.json::<T>()
            .await
            .map_err(|e| SendError::Other(e.to_string()))
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    async fn get_user(&self, user_id: &str) -> UserLookup {
        tracing::debug!(user_id = %user_id, "fetching user info");

        if !is_addressable(user_id) {
            return UserLookup::failure(format!("invalid user id: {user_id:?}"));
        }
        let url = match self.endpoint(&["users", user_id]) {
            Ok(url) => url,
            Err(err) => return UserLookup::failure(err.to_string()),
        };

        match self.send::<UserLookup>(self.client.get(url)).await {
            Ok(res) => {
                if !res.success {
                    tracing::warn!(user_id = %user_id, message = %res.message, "user lookup unsuccessful");
                }
                res
            }
            Err(err) => {
                tracing::error!(user_id = %user_id, error = %err, "user lookup failed");
                UserLookup {
                    credential_error: err.credential_error(),
                    ..UserLookup::failure(format!("Failed to fetch user information: {err}"))
                }
            }
        }
    }

    async fn get_users(&self, user_ids: &[String]) -> UsersLookup {
        tracing::debug!(count = user_ids.len(), "fetching users info");

        let url = match self.endpoint(&["users", "batch"]) {
            Ok(url) => url,
            Err(err) => return UsersLookup::failure(err.to_string()),
        };

        let req = self.client.post(url).json(&GetUsersRequest { user_ids });
        match self.send::<UsersLookup>(req).await {
            Ok(res) => {
                if !res.not_found_ids.is_empty() {
                    tracing::warn!(not_found = ?res.not_found_ids, "some user ids were not found");
                }
                res
            }
            Err(err) => {
                tracing::error!(count = user_ids.len(), error = %err, "batch user lookup failed");
                UsersLookup {
                    credential_error: err.credential_error(),
                    ..UsersLookup::failure(format!("Failed to fetch users information: {err}"))
                }
            }
        }
    }
}
