/*
 * Responsibility
 * - v1 URL layout
 * - Declares the authorization rule of each protected route (enforce::protect)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{
    me::me,
    users::{get_user, get_users},
};
use crate::middleware::auth::enforce;
use crate::services::authz::DeclaredRule;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let users = state
        .enforcer
        .scope("users")
        .rule(DeclaredRule::any_role(["ADMIN", "STAFF"]));

    // Own profile, or any profile for admins.
    let get_user_op = users
        .operation("get_user")
        .rule(
            DeclaredRule::expression(
                "isAuthenticated() and user.userId == #userId or hasRole('ADMIN')",
            )
            .with_message("Access denied: you can only view your own profile"),
        )
        .params(["userId"])
        .build();

    let get_users_op = users.operation("get_users").build();

    Router::new()
        .route("/me", get(me))
        .route("/users/batch", enforce::protect(post(get_users), get_users_op))
        .route("/users/{userId}", enforce::protect(get(get_user), get_user_op))
}
