/*
 * Responsibility
 * - /users handlers (pass-through to the user directory)
 * - Authorization is done by the route_layer before these run
 * - Missing service credentials surface as 502; other lookup failures pass through
 */
use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    api::v1::dto::users::BatchUsersRequest,
    error::AppError,
    services::users::{UserLookup, UsersLookup},
    state::AppState,
};

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserLookup>, AppError> {
    let mut lookup = state.users.get_user(&user_id).await;
    if let Some(err) = lookup.credential_error.take() {
        return Err(AppError::Credential(err));
    }
    if lookup.success && lookup.user.is_none() {
        return Err(AppError::not_found("user"));
    }
    Ok(Json(lookup))
}

pub async fn get_users(
    State(state): State<AppState>,
    Json(req): Json<BatchUsersRequest>,
) -> Result<Json<UsersLookup>, AppError> {
    req.validate()
        .map_err(|msg| AppError::bad_request("INVALID_REQUEST", msg))?;

    let mut lookup = state.users.get_users(&req.user_ids).await;
    if let Some(err) = lookup.credential_error.take() {
        return Err(AppError::Credential(err));
    }
    Ok(Json(lookup))
}
