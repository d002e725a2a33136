//! Bearer token → Identity, installed in the security context for the rest of the request.
//!
//! - Public paths skip the gate entirely.
//! - `Authorization: Bearer <token>` is validated against the authority.
//! - The gate never rejects; a missing or invalid token just leaves an
//!   unauthenticated (or absent) identity for the enforcer to judge.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::services::auth::context::SecurityContext;
use crate::services::auth::identity::Identity;
use crate::state::AppState;

/// Paths served without touching the gate.
///
/// Entries ending in `/` or `*` match as prefixes, everything else must match exactly.
#[derive(Debug, Clone, Default)]
pub struct PublicPaths {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl PublicPaths {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut paths = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            if let Some(prefix) = entry.strip_suffix('*') {
                paths.prefixes.push(prefix.to_string());
            } else if entry.ends_with('/') {
                paths.prefixes.push(entry.to_string());
            } else {
                paths.exact.push(entry.to_string());
            }
        }
        paths
    }

    pub fn matches(&self, path: &str) -> bool {
        self.exact.iter().any(|p| p == path) || self.prefixes.iter().any(|p| path.starts_with(p))
    }
}

/// Wrap the whole router with the gate.
///
/// ```ignore
/// let app = middleware::auth::gate::apply(router, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, gate_middleware))
}

/// Token carried by `Authorization: Bearer <token>`, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

async fn gate_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if state.public_paths.matches(req.uri().path()) {
        return next.run(req).await;
    }

    // Owned: the request body is not Sync, so no borrow of `req` may cross an await.
    let token = bearer_token(req.headers()).map(str::to_owned);
    let identity = match token {
        Some(token) => Some(resolve(&state, &token).await),
        None => None,
    };

    SecurityContext::scope(async move {
        let _guard = identity.map(|identity| {
            let identity = Arc::new(identity);
            // middleware → extractor
            req.extensions_mut().insert(identity.clone());
            SecurityContext::set(identity)
        });
        next.run(req).await
    })
    .await
}

async fn resolve(state: &AppState, token: &str) -> Identity {
    let verdict = state.validator.validate(token).await;
    if !verdict.is_valid() {
        tracing::warn!("bearer token rejected by authority; continuing unauthenticated");
    }
    let identity = verdict.into_identity(token);
    tracing::debug!(user_id = ?identity.user_id(), authenticated = identity.is_authenticated(), "identity resolved");
    identity
}
