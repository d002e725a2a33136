use thiserror::Error;

use crate::services::authz::rule::AUTHENTICATION_REQUIRED_MESSAGE;

/// Terminal outcomes of an authorization check.
///
/// Kept independent from `AppError` so non-HTTP callers can match on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthzError {
    /// No valid identity where one is mandated.
    #[error("{message}")]
    AuthenticationRequired { message: String },
    /// Valid identity, rule evaluated to deny.
    #[error("{message}")]
    AccessDenied { message: String },
}

impl AuthzError {
    pub fn authentication_required() -> Self {
        Self::AuthenticationRequired {
            message: AUTHENTICATION_REQUIRED_MESSAGE.to_string(),
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }
}
