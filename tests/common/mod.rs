#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use service_guard::middleware::auth::gate::PublicPaths;
use service_guard::services::auth::credentials::{CredentialCache, UnconfiguredExchange};
use service_guard::services::auth::validator::{Claims, TokenValidator, Verdict};
use service_guard::services::users::{UserDirectory, UserInfo, UserLookup, UsersLookup};
use service_guard::state::AppState;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub fn post_json(uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

/// Authority stand-in: known tokens map to claims, everything else is invalid.
#[derive(Default)]
pub struct FakeAuthority {
    tokens: HashMap<String, Claims>,
    calls: AtomicUsize,
}

impl FakeAuthority {
    pub fn with_user(mut self, token: &str, user_id: &str, roles: &[&str]) -> Self {
        self.tokens.insert(
            token.to_string(),
            Claims {
                user_id: user_id.to_string(),
                email: Some(format!("{user_id}@example.com")),
                display_name: None,
                avatar_url: None,
                roles: roles.iter().map(|r| r.to_string()).collect(),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenValidator for FakeAuthority {
    async fn validate(&self, token: &str) -> Verdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.tokens.get(token) {
            Some(claims) => Verdict::Valid(claims.clone()),
            None => Verdict::invalid("unknown token"),
        }
    }
}

/// Answers every lookup with a user carrying the requested id.
#[derive(Default)]
pub struct EchoDirectory;

#[async_trait]
impl UserDirectory for EchoDirectory {
    fn backend_name(&self) -> &'static str {
        "echo"
    }

    async fn get_user(&self, user_id: &str) -> UserLookup {
        UserLookup {
            success: true,
            message: "ok".into(),
            user: Some(UserInfo {
                user_id: user_id.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn get_users(&self, user_ids: &[String]) -> UsersLookup {
        UsersLookup {
            success: true,
            message: "ok".into(),
            users: user_ids
                .iter()
                .map(|id| UserInfo {
                    user_id: id.clone(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }
}

pub fn authority() -> FakeAuthority {
    FakeAuthority::default()
        .with_user("admin-token", "1", &["ROLE_ADMIN"])
        .with_user("staff-token", "2", &["STAFF"])
        .with_user("user-42", "42", &["USER"])
        .with_user("user-7", "7", &["USER"])
}

pub fn state(authority: Arc<FakeAuthority>) -> AppState {
    state_with_users(authority, Arc::new(EchoDirectory))
}

pub fn state_with_users(authority: Arc<FakeAuthority>, users: Arc<dyn UserDirectory>) -> AppState {
    AppState::new(
        authority,
        PublicPaths::new(["/health", "/ping", "/actuator/"]),
        users,
        Arc::new(CredentialCache::new(
            Arc::new(UnconfiguredExchange),
            Duration::from_secs(30),
        )),
    )
}
