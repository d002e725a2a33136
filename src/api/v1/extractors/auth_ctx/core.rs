use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::identity::Identity;
use crate::services::authz::rule::AUTHENTICATION_REQUIRED_MESSAGE;

/// Extractor for the authenticated caller.
/// The gate inserts the Identity into request extensions; a missing or
/// unauthenticated identity rejects with 401.
pub struct CurrentIdentity(pub Arc<Identity>);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<Identity>>()
            .filter(|identity| identity.is_authenticated())
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(|| AppError::AuthenticationRequired(AUTHENTICATION_REQUIRED_MESSAGE.into()))
    }
}
