/*
[INPUT]:  Mock HTTP responses
[OUTPUT]: Test results for the HTTP client refresh protocol
[POS]:    Integration tests - HTTP client
[UPDATE]: When request construction or refresh handling changes
*/

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use astrogators_client::{
    ApiClient, ApiClientConfig, ApiError, MemoryTokenStore, RefreshError, TokenStore, User,
};
use common::{client_with_tokens, setup_mock_server, user_json};
use tokio_test::assert_ok;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

const REFRESH_PATH: &str = "/api/v1/auth/refresh-token";

#[tokio::test]
async fn test_current_user_with_valid_token() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .and(header("authorization", "Bearer valid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _tokens) = client_with_tokens(&server, Some("valid"), Some("refresh-1"));

    let raw: serde_json::Value = assert_ok!(client.get("/api/v1/users/me").await);
    assert_eq!(raw, user_json());

    let user: User = assert_ok!(client.current_user().await);
    assert_eq!(user.username, "pilot");
}

#[tokio::test]
async fn test_no_content_ignores_body() {
    let server = setup_mock_server().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/users/me/ally-codes/3/use"))
        .respond_with(ResponseTemplate::new(204).set_body_string("{\"unexpected\": true}"))
        .mount(&server)
        .await;

    let (client, _tokens) = client_with_tokens(&server, Some("valid"), None);
    let body = assert_ok!(client.touch_ally_code(3).await);
    assert_eq!(body, serde_json::json!({}));
}

#[tokio::test]
async fn test_error_body_detail_is_normalized() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"detail": "Invalid credentials"})),
        )
        .mount(&server)
        .await;

    let (client, _tokens) = client_with_tokens(&server, None, None);
    let err = client
        .post::<serde_json::Value, _>(
            "/api/v1/auth/login",
            Some(&serde_json::json!({"email": "a@b.c", "password": "x"})),
        )
        .await
        .unwrap_err();

    let normalized = err.normalized().expect("request error");
    assert_eq!(normalized.message, "Invalid credentials");
    assert_eq!(normalized.status, Some(400));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_unauthorized_requests_share_one_refresh() {
    let server = setup_mock_server().await;
    let protected = ["/api/v1/users/me", "/api/v1/users/me/ally-codes", "/api/v1/config/features"];

    for endpoint in protected {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .and(header("authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(endpoint))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "endpoint": endpoint,
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(serde_json::json!({
                    "access_token": "fresh",
                    "token_type": "bearer",
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, tokens) = client_with_tokens(&server, Some("stale"), Some("refresh-1"));

    let handles: Vec<_> = protected
        .iter()
        .map(|&endpoint| {
            let client = client.clone();
            tokio::spawn(async move { client.get::<serde_json::Value>(endpoint).await })
        })
        .collect();

    for (handle, endpoint) in handles.into_iter().zip(protected) {
        let body = assert_ok!(handle.await.expect("task panicked"));
        assert_eq!(body["endpoint"], endpoint);
    }

    assert_eq!(tokens.access_token().as_deref(), Some("fresh"));
    assert_eq!(tokens.refresh_token().as_deref(), Some("refresh-1"));
    assert!(!client.refresh_in_flight());
}

#[tokio::test]
async fn test_retry_that_still_fails_is_not_refreshed_again() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "detail": "Inactive user",
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh",
            "token_type": "bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, tokens) = client_with_tokens(&server, Some("stale"), Some("refresh-1"));

    let err = client.current_user().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.normalized().unwrap().message, "Inactive user");
    assert_eq!(tokens.access_token().as_deref(), Some("fresh"));

    let requests = server.received_requests().await.unwrap();
    let retried = requests
        .iter()
        .filter(|r| r.url.path() == "/api/v1/users/me")
        .nth(1)
        .expect("retry request");
    assert_eq!(
        retried.headers.get("authorization").unwrap(),
        "Bearer fresh"
    );
}

#[tokio::test]
async fn test_rejected_refresh_fails_all_waiters_and_notifies_once() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(401)
                .set_delay(Duration::from_millis(200))
                .set_body_json(serde_json::json!({"detail": "Refresh token expired"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    let tokens = Arc::new(MemoryTokenStore::new());
    tokens.set_tokens("stale", "expired-refresh");

    let config = ApiClientConfig::new(server.uri()).with_on_unauthorized(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let client = assert_ok!(ApiClient::new(config, tokens.clone()));

    let (first, second) = tokio::join!(
        client.get::<serde_json::Value>("/api/v1/users/me"),
        client.get::<serde_json::Value>("/api/v1/users/me/ally-codes"),
    );

    for result in [first, second] {
        match result {
            Err(ApiError::AuthenticationFailed(RefreshError::Rejected { status })) => {
                assert_eq!(status, 401);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(!tokens.is_authenticated());
    assert!(tokens.refresh_token().is_none());
}

#[tokio::test]
async fn test_refresh_slot_is_released_after_failure() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh",
            "token_type": "bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    // First attempt has no refresh token and fails without a network call.
    let (client, tokens) = client_with_tokens(&server, Some("stale"), None);
    let err = client.current_user().await.unwrap_err();
    assert!(err.is_auth_error());
    assert!(!client.refresh_in_flight());

    // A later session can refresh again.
    tokens.set_tokens("stale", "refresh-2");
    let user = assert_ok!(client.current_user().await);
    assert_eq!(user.email, "pilot@example.com");
}

/// Client with tokens `stale`/`refresh-1` and a counter for unauthorized callbacks
fn counting_client(
    config: ApiClientConfig,
) -> (ApiClient, Arc<MemoryTokenStore>, Arc<AtomicUsize>) {
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    let tokens = Arc::new(MemoryTokenStore::new());
    tokens.set_tokens("stale", "refresh-1");

    let config = config.with_on_unauthorized(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let client = ApiClient::new(config, tokens.clone()).expect("client init");
    (client, tokens, notified)
}

#[tokio::test]
async fn test_unparsable_refresh_body_signs_out() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let (client, tokens, notified) = counting_client(ApiClientConfig::new(server.uri()));

    let err = client.current_user().await.unwrap_err();
    assert!(matches!(err, ApiError::AuthenticationFailed(RefreshError::InvalidResponse(_))));
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(tokens.access_token().is_none());
    assert!(tokens.refresh_token().is_none());
    assert!(!client.refresh_in_flight());
}

#[tokio::test]
async fn test_refresh_transport_failure_signs_out() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(serde_json::json!({
                    "access_token": "too-late",
                    "token_type": "bearer",
                })),
        )
        .mount(&server)
        .await;

    let config = ApiClientConfig::new(server.uri()).with_timeout(Duration::from_millis(300));
    let (client, tokens, notified) = counting_client(config);

    let err = client.current_user().await.unwrap_err();
    assert!(matches!(err, ApiError::AuthenticationFailed(RefreshError::Transport(_))));
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(!tokens.is_authenticated());
    assert!(tokens.refresh_token().is_none());
    assert!(!client.refresh_in_flight());
}

#[tokio::test]
async fn test_transport_error_is_returned_unchanged() {
    let config = ApiClientConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2));
    let client = assert_ok!(ApiClient::new(config, Arc::new(MemoryTokenStore::new())));

    let err = client.current_user().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}
