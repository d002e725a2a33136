//! Attach machine-to-machine credentials to outbound calls.
use std::sync::Arc;

use axum::http::{HeaderValue, header};

use crate::services::auth::credentials::{CredentialCache, CredentialError};

#[derive(Clone, Debug)]
pub struct OutboundAuth {
    cache: Arc<CredentialCache>,
}

impl OutboundAuth {
    pub fn new(cache: Arc<CredentialCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &CredentialCache {
        &self.cache
    }

    /// `Authorization: Bearer <token>` value for transports other than reqwest.
    pub async fn bearer_header(&self) -> Result<HeaderValue, CredentialError> {
        let token = self.cache.get_token().await?;
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| CredentialError::Malformed("token is not a valid header value".into()))
    }

    /// Add credentials to `req`. On error the request must not be sent.
    pub async fn authorize(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, CredentialError> {
        let value = self.bearer_header().await?;
        Ok(req.header(header::AUTHORIZATION, value))
    }
}
