use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use service_guard::services::auth::credentials::{
    ClientCredentials, ClientCredentialsExchange, CredentialCache, CredentialError, TokenExchange,
    UnconfiguredExchange,
};
use service_guard::services::auth::outbound::OutboundAuth;
use service_guard::services::auth::validator::{HttpTokenValidator, TokenValidator, Verdict};
use service_guard::services::users::{HttpUserDirectory, UserDirectory};
use url::Url;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn validator(server: &MockServer, timeout: Duration) -> HttpTokenValidator {
    let endpoint = Url::parse(&format!("{}/api/auth/validate", server.uri())).expect("url");
    HttpTokenValidator::new(endpoint, timeout).expect("client")
}

fn exchange(server: &MockServer) -> ClientCredentialsExchange {
    ClientCredentialsExchange::new(
        ClientCredentials {
            token_uri: Url::parse(&format!("{}/oauth2/token", server.uri())).expect("url"),
            client_id: "chat-service".into(),
            client_secret: "s3cret".into(),
            scopes: vec!["api.read".into(), "api.write".into()],
        },
        Duration::from_secs(2),
    )
    .expect("client")
}

#[tokio::test]
async fn validator_maps_authority_answer_to_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/validate"))
        .and(body_json(json!({"token": "good"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isValid": true,
            "userId": "42",
            "email": "ada@example.com",
            "fullName": "Ada",
            "roles": "ROLE_ADMIN, STAFF"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let verdict = validator(&server, Duration::from_secs(2)).validate("good").await;
    let identity = verdict.into_identity("good");

    assert!(identity.is_authenticated());
    assert_eq!(identity.user_id(), Some("42"));
    assert_eq!(identity.display_name(), Some("Ada"));
    assert!(identity.has_role("ADMIN"));
    assert!(identity.has_role("ROLE_STAFF"));
}

#[tokio::test]
async fn validator_failures_are_invalid_not_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/api/auth/validate"))
        .and(body_json(json!({"token": "rejected"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"isValid": false, "message": "expired"})),
        )
        .mount(&server)
        .await;
    Mock::given(path("/api/auth/validate"))
        .and(body_json(json!({"token": "boom"})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(path("/api/auth/validate"))
        .and(body_json(json!({"token": "garbled"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;
    Mock::given(path("/api/auth/validate"))
        .and(body_json(json!({"token": "slow"})))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let validator = validator(&server, Duration::from_millis(100));

    assert_eq!(
        validator.validate("rejected").await,
        Verdict::invalid("expired")
    );
    for token in ["boom", "garbled", "slow"] {
        let verdict = validator.validate(token).await;
        assert!(!verdict.is_valid(), "{token} should be invalid");

        let identity = verdict.into_identity(token);
        assert!(!identity.is_authenticated());
        assert!(!identity.has_role("ADMIN"));
        assert_eq!(identity.raw_token(), Some(token));
    }
}

#[tokio::test]
async fn exchange_posts_client_credentials_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=chat-service"))
        .and(body_string_contains("scope=api.read+api.write"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "m2m-1",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let issued = exchange(&server).exchange().await.expect("token");
    assert_eq!(issued.access_token, "m2m-1");
    assert_eq!(issued.expires_in, 3600);
}

#[tokio::test]
async fn exchange_reports_status_and_malformed_bodies() {
    let server = MockServer::start().await;
    Mock::given(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
        .mount(&server)
        .await;

    let exchange = exchange(&server);
    assert_eq!(exchange.exchange().await, Err(CredentialError::Status(401)));
    assert!(matches!(
        exchange.exchange().await,
        Err(CredentialError::Malformed(_))
    ));
}

#[tokio::test]
async fn concurrent_callers_share_one_token_request() {
    let server = MockServer::start().await;
    Mock::given(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accessToken": "m2m-shared", "expiresIn": 3600}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(CredentialCache::new(
        Arc::new(exchange(&server)),
        Duration::from_secs(30),
    ));

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move { cache.get_token().await }));
    }
    for task in tasks {
        assert_eq!(task.await.expect("join"), Ok("m2m-shared".to_string()));
    }
}

#[tokio::test]
async fn user_directory_sends_service_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "m2m", "expires_in": 3600})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/42"))
        .and(header("authorization", "Bearer m2m"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "ok",
            "user": {"userId": "42", "email": "ada@example.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/batch"))
        .and(header("authorization", "Bearer m2m"))
        .and(body_json(json!({"userIds": ["42", "404"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "ok",
            "users": [{"userId": "42"}],
            "notFoundIds": ["404"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(CredentialCache::new(
        Arc::new(exchange(&server)),
        Duration::from_secs(30),
    ));
    let base = Url::parse(&format!("{}/api/", server.uri())).expect("url");
    let directory =
        HttpUserDirectory::new(base, OutboundAuth::new(cache), Duration::from_secs(2)).expect("client");

    let one = directory.get_user("42").await;
    assert!(one.success);
    assert_eq!(
        one.user.and_then(|u| u.email),
        Some("ada@example.com".to_string())
    );

    let many = directory.get_users(&["42".into(), "404".into()]).await;
    assert!(many.success);
    assert_eq!(many.users.len(), 1);
    assert_eq!(many.not_found_ids, vec!["404".to_string()]);
}

#[tokio::test]
async fn user_directory_sends_nothing_without_credentials() {
    let server = MockServer::start().await;
    Mock::given(path("/api/users/42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cache = Arc::new(CredentialCache::new(
        Arc::new(UnconfiguredExchange),
        Duration::from_secs(30),
    ));
    let base = Url::parse(&format!("{}/api/", server.uri())).expect("url");
    let directory =
        HttpUserDirectory::new(base, OutboundAuth::new(cache), Duration::from_secs(2)).expect("client");

    let lookup = directory.get_user("42").await;
    assert!(!lookup.success);
    assert!(lookup.message.contains("service credentials"));
    assert_eq!(lookup.credential_error, Some(CredentialError::NotConfigured));
}

#[tokio::test]
async fn rejected_service_token_is_refreshed_on_next_call() {
    let server = MockServer::start().await;
    Mock::given(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "m2m", "expires_in": 3600})),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(path("/api/users/42"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/api/users/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "user": {"userId": "42"}
        })))
        .mount(&server)
        .await;

    let cache = Arc::new(CredentialCache::new(
        Arc::new(exchange(&server)),
        Duration::from_secs(30),
    ));
    let base = Url::parse(&format!("{}/api/", server.uri())).expect("url");
    let directory =
        HttpUserDirectory::new(base, OutboundAuth::new(cache), Duration::from_secs(2)).expect("client");

    assert!(!directory.get_user("42").await.success);
    assert!(directory.get_user("42").await.success);
}

#[tokio::test]
async fn user_id_stays_inside_the_users_path() {
    let server = MockServer::start().await;
    Mock::given(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "m2m", "expires_in": 3600})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/..%2Finternal%2Fsecrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "user not found"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/api/internal/secrets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(0)
        .mount(&server)
        .await;

    let cache = Arc::new(CredentialCache::new(
        Arc::new(exchange(&server)),
        Duration::from_secs(30),
    ));
    let base = Url::parse(&format!("{}/api/", server.uri())).expect("url");
    let directory =
        HttpUserDirectory::new(base, OutboundAuth::new(cache), Duration::from_secs(2)).expect("client");

    let lookup = directory.get_user("../internal/secrets").await;
    assert!(!lookup.success);
    assert_eq!(lookup.message, "user not found");

    // Dot segments would be normalized away, so they are refused outright.
    let lookup = directory.get_user("..").await;
    assert!(!lookup.success);
    assert!(lookup.message.starts_with("invalid user id"));
}
