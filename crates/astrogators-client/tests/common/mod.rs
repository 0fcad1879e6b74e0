/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for astrogators-client tests

use std::path::PathBuf;
use std::sync::Arc;

use astrogators_client::{ApiClient, ApiClientConfig, MemoryTokenStore, TokenStore};
use uuid::Uuid;
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client pointed at `server` with an in-memory token store
#[allow(dead_code)]
pub fn client_with_tokens(
    server: &MockServer,
    access: Option<&str>,
    refresh: Option<&str>,
) -> (ApiClient, Arc<MemoryTokenStore>) {
    let tokens = Arc::new(MemoryTokenStore::new());
    if let Some(access) = access {
        tokens.set_access_token(access);
    }
    if let Some(refresh) = refresh {
        tokens.set_refresh_token(refresh);
    }
    let client = ApiClient::new(ApiClientConfig::new(server.uri()), tokens.clone())
        .expect("client init");
    (client, tokens)
}

/// User record as returned by GET /api/v1/users/me
pub fn user_json() -> serde_json::Value {
    serde_json::json!({
        "id": "3f1c2e4a-0000-4000-8000-000000000001",
        "email": "pilot@example.com",
        "username": "pilot",
        "is_verified": true,
        "is_active": true,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-02T00:00:00Z"
    })
}

/// Fresh directory path under the system temp dir (not created)
#[allow(dead_code)]
pub fn temp_dir() -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("astrogators-test-{}", Uuid::new_v4()));
    path
}
