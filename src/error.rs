/*
 * Responsibility
 * - App-wide ApiError definition
 * - IntoResponse (HTTP status / JSON error body)
 * - Maps authorization and credential errors to distinct, stable status codes
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::credentials::CredentialError;
use crate::services::authz::error::AuthzError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("outbound credentials unavailable: {0}")]
    Credential(#[from] CredentialError),
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{resource} not found."),
            ),
            AppError::AuthenticationRequired(message) => {
                (StatusCode::UNAUTHORIZED, "AUTHENTICATION_REQUIRED", message)
            }
            AppError::AccessDenied(message) => (StatusCode::FORBIDDEN, "ACCESS_DENIED", message),
            AppError::Credential(err) => {
                // Details stay in the logs; the client only learns the upstream call failed.
                tracing::error!(error = %err, "outbound call aborted: no service credentials");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_CREDENTIALS",
                    "upstream service credentials unavailable".into(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                status: status.as_u16(),
                timestamp: Utc::now(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthzError> for AppError {
    fn from(e: AuthzError) -> Self {
        match e {
            AuthzError::AuthenticationRequired { message } => {
                AppError::AuthenticationRequired(message)
            }
            AuthzError::AccessDenied { message } => AppError::AccessDenied(message),
        }
    }
}
