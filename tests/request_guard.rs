mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::{Router, routing::get};
use common::{authority, get as get_req, post_json, read_json, state};
use serde_json::json;
use service_guard::app::build_router;
use service_guard::middleware::auth::{enforce, gate};
use service_guard::services::auth::context::SecurityContext;
use service_guard::services::authz::DeclaredRule;
use tower::ServiceExt;

fn app() -> (Arc<common::FakeAuthority>, Router) {
    let authority = Arc::new(authority());
    let router = build_router(state(authority.clone()), Duration::from_secs(5));
    (authority, router)
}

#[tokio::test]
async fn public_paths_skip_the_gate() {
    let (authority, app) = app();

    let response = app
        .clone()
        .oneshot(get_req("/health", Some("admin-token")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_req("/ping", None)).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(authority.calls(), 0);
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let (_authority, app) = app();

    let response = app
        .clone()
        .oneshot(get_req("/api/v1/me", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json(response).await;
    assert_eq!(payload["error"]["code"], "AUTHENTICATION_REQUIRED");
    assert_eq!(payload["error"]["status"], 401);

    let response = app
        .clone()
        .oneshot(get_req("/api/v1/me", Some("forged")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get_req("/api/v1/me", Some("user-42")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["userId"], "42");
    assert_eq!(payload["authenticated"], true);
    assert_eq!(payload["roles"], json!(["USER"]));
    assert!(payload.get("rawToken").is_none());
}

#[tokio::test]
async fn own_profile_rule_distinguishes_401_and_403() {
    let (_authority, app) = app();

    let response = app
        .clone()
        .oneshot(get_req("/api/v1/users/42", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get_req("/api/v1/users/42", Some("forged")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get_req("/api/v1/users/42", Some("user-7")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json(response).await;
    assert_eq!(payload["error"]["code"], "ACCESS_DENIED");
    assert_eq!(
        payload["error"]["message"],
        "Access denied: you can only view your own profile"
    );

    let response = app
        .clone()
        .oneshot(get_req("/api/v1/users/42", Some("user-42")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["user"]["userId"], "42");

    // ROLE_ADMIN held, 'ADMIN' required
    let response = app
        .oneshot(get_req("/api/v1/users/42", Some("admin-token")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn batch_lookup_uses_scope_role_rule() {
    let (_authority, app) = app();
    let body = json!({"userIds": ["1", "2"]});

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/users/batch", None, body.clone()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/users/batch", Some("user-42"), body.clone()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json(response).await;
    assert_eq!(
        payload["error"]["message"],
        "Access denied: insufficient privileges"
    );

    let response = app
        .clone()
        .oneshot(post_json("/api/v1/users/batch", Some("staff-token"), body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["users"].as_array().map(Vec::len), Some(2));

    let response = app
        .oneshot(post_json(
            "/api/v1/users/batch",
            Some("admin-token"),
            json!({"userIds": []}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn request_id_is_propagated() {
    let (_authority, app) = app();

    let mut req = get_req("/health", None);
    req.headers_mut()
        .insert("x-request-id", "req-123".parse().expect("header"));
    let response = app.oneshot(req).await.expect("response");

    assert_eq!(
        response.headers().get("x-request-id").map(|v| v.as_bytes()),
        Some(&b"req-123"[..])
    );
}

#[tokio::test]
async fn handlers_see_the_identity_through_the_security_context() {
    let authority = Arc::new(authority());
    let state = state(authority);

    let op = state
        .enforcer
        .scope("reports")
        .operation("view")
        .rule(DeclaredRule::expression("#owner == user.userId"))
        .build();

    async fn whoami() -> String {
        SecurityContext::current_user_id().unwrap_or_else(|| "nobody".to_string())
    }

    let router = Router::new()
        .route("/whoami", get(whoami))
        .route("/reports/{owner}", enforce::protect(get(whoami), op));
    let app = gate::apply(router, state.clone()).with_state(state);

    let response = app
        .clone()
        .oneshot(get_req("/whoami", Some("user-7")))
        .await
        .expect("response");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"7");

    let response = app
        .clone()
        .oneshot(get_req("/whoami", None))
        .await
        .expect("response");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"nobody");

    let response = app
        .clone()
        .oneshot(get_req("/reports/7", Some("user-7")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_req("/reports/42", Some("user-7")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Nothing leaks out of the request scope.
    assert!(SecurityContext::get().is_none());
}

#[tokio::test]
async fn undeclared_query_parameters_never_reach_the_rule() {
    let state = state(Arc::new(authority()));
    let reports = state.enforcer.scope("reports");

    let view = reports
        .operation("view")
        .rule(DeclaredRule::expression("#owner == user.userId"))
        .params(["reportId"])
        .build();
    let list = reports
        .operation("list")
        .rule(DeclaredRule::expression("#limit != null and #limit <= '50'"))
        .params(["limit"])
        .build();

    async fn ok() -> &'static str {
        "ok"
    }

    let router = Router::new()
        .route("/reports/{reportId}", enforce::protect(get(ok), view))
        .route("/reports", enforce::protect(get(ok), list));
    let app = gate::apply(router, state.clone()).with_state(state);

    let response = app
        .clone()
        .oneshot(get_req("/reports/99?owner=7", Some("user-7")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Declared query parameters are bound.
    let response = app
        .clone()
        .oneshot(get_req("/reports?limit=20", Some("user-7")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_req("/reports?limit=90", Some("user-7")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_service_credentials_surface_as_bad_gateway() {
    use service_guard::services::auth::credentials::{CredentialCache, UnconfiguredExchange};
    use service_guard::services::auth::outbound::OutboundAuth;
    use service_guard::services::users::HttpUserDirectory;

    // Never contacted: the call is aborted before it is sent.
    let base = url::Url::parse("http://127.0.0.1:9/api/").expect("url");
    let cache = Arc::new(CredentialCache::new(
        Arc::new(UnconfiguredExchange),
        Duration::from_secs(30),
    ));
    let users = HttpUserDirectory::new(base, OutboundAuth::new(cache), Duration::from_secs(1))
        .expect("client");
    let state = common::state_with_users(Arc::new(authority()), Arc::new(users));
    let app = build_router(state, Duration::from_secs(5));

    let response = app
        .clone()
        .oneshot(get_req("/api/v1/users/42", Some("user-42")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json(response).await;
    assert_eq!(payload["error"]["code"], "UPSTREAM_CREDENTIALS");

    let response = app
        .oneshot(post_json(
            "/api/v1/users/batch",
            Some("staff-token"),
            json!({"userIds": ["1"]}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn panicking_handler_leaves_no_identity_for_later_requests() {
    let state = state(Arc::new(authority()));

    async fn boom() -> &'static str {
        panic!("handler failure")
    }

    async fn whoami() -> String {
        SecurityContext::current_user_id().unwrap_or_else(|| "nobody".to_string())
    }

    let router = Router::new()
        .route("/boom", get(boom))
        .route("/whoami", get(whoami));
    let app = gate::apply(router, state.clone()).with_state(state);

    let crashed = tokio::spawn(app.clone().oneshot(get_req("/boom", Some("user-7")))).await;
    assert!(crashed.is_err_and(|err| err.is_panic()));

    let response = app
        .clone()
        .oneshot(get_req("/whoami", None))
        .await
        .expect("response");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"nobody");

    let response = app
        .oneshot(get_req("/whoami", Some("user-42")))
        .await
        .expect("response");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"42");
    assert!(SecurityContext::get().is_none());
}
