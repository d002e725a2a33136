//! User lookup capability (pass-through to the user service).
//!
//! Failures never surface as errors: every call answers with
//! `success: false` and a message instead. When the failure was the
//! service's own credentials, `credential_error` says so (never serialized).
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::services::auth::credentials::CredentialError;

mod http;

pub use http::HttpUserDirectory;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
    pub user_id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserLookup {
    pub success: bool,
    pub message: String,
    pub user: Option<UserInfo>,
    #[serde(skip)]
    pub credential_error: Option<CredentialError>,
}

impl UserLookup {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsersLookup {
    pub success: bool,
    pub message: String,
    pub users: Vec<UserInfo>,
    pub not_found_ids: Vec<String>,
    #[serde(skip)]
    pub credential_error: Option<CredentialError>,
}

impl UsersLookup {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    // Returns the backend name (for logging).
    fn backend_name(&self) -> &'static str;

    async fn get_user(&self, user_id: &str) -> UserLookup;

    async fn get_users(&self, user_ids: &[String]) -> UsersLookup;
}

/// Selected when no user service is configured.
#[derive(Clone, Debug, Default)]
pub struct NoopUserDirectory;

const NOT_CONFIGURED: &str = "user directory not configured";

#[async_trait]
impl UserDirectory for NoopUserDirectory {
    fn backend_name(&self) -> &'static str {
        "noop"
    }

    async fn get_user(&self, _user_id: &str) -> UserLookup {
        UserLookup::failure(NOT_CONFIGURED)
    }

    async fn get_users(&self, _user_ids: &[String]) -> UsersLookup {
        UsersLookup::failure(NOT_CONFIGURED)
    }
}
