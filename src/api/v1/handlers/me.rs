/*
 * Responsibility
 * - GET /me: the caller as resolved by the gate
 */
use axum::Json;

use crate::api::v1::extractors::CurrentIdentity;
use crate::services::auth::identity::Identity;

pub async fn me(CurrentIdentity(identity): CurrentIdentity) -> Json<Identity> {
    Json(Identity::clone(&identity))
}
