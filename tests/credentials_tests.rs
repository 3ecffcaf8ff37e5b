mod common;

use std::time::Duration;

use api_test_runner::engine::{AuthError, ClientCredentials, CredentialManager, Grant};
use common::*;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials(server: &MockServer) -> ClientCredentials {
    ClientCredentials::refresh(
        format!("{}{}", server.uri(), TOKEN_PATH),
        "test-client",
        "test-secret",
        "test-refresh",
    )
}

#[tokio::test]
async fn test_acquire_token_posts_refresh_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=test-refresh"))
        .and(body_string_contains("client_id=test-client"))
        .and(body_string_contains("client_secret=test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "token_type": "Bearer",
            "expires_in": 120,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut manager = CredentialManager::new();
    let token = manager.acquire_token(&credentials(&server)).await.unwrap();

    assert_eq!(token.access_token, "tok-1");
    assert_eq!(token.refresh_token, "test-refresh");
    assert_eq!(
        (token.expires_at - token.issued_at).num_seconds(),
        120
    );
    assert_eq!(manager.acquisitions(), 1);
}

#[tokio::test]
async fn test_acquire_token_with_authorization_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-2"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut creds = credentials(&server);
    creds.grant = Grant::AuthorizationCode {
        code: "abc".to_string(),
        redirect_uri: None,
    };

    let token = CredentialManager::new().acquire_token(&creds).await.unwrap();
    assert_eq!(token.access_token, "tok-2");
    assert_eq!(token.token_type, "Bearer");
}

#[tokio::test]
async fn test_get_valid_token_uses_cache() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-1", 3600).await;

    let creds = credentials(&server);
    let mut manager = CredentialManager::new();

    let first = manager.get_valid_token(&creds).await.unwrap();
    let second = manager.get_valid_token(&creds).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(manager.acquisitions(), 1);

    manager.reset();
    manager.get_valid_token(&creds).await.unwrap();
    assert_eq!(manager.acquisitions(), 1);
}

#[tokio::test]
async fn test_get_valid_token_refreshes_near_expiry() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-1", 10).await;

    let creds = credentials(&server);
    let mut manager = CredentialManager::new().margin(Duration::from_secs(60));

    manager.get_valid_token(&creds).await.unwrap();
    manager.get_valid_token(&creds).await.unwrap();
    assert_eq!(manager.acquisitions(), 2);
}

#[tokio::test]
async fn test_cache_is_per_refresh_token() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-1", 3600).await;

    let mut manager = CredentialManager::new();
    let creds = credentials(&server);
    let mut other = credentials(&server);
    other.grant = Grant::RefreshToken("another-refresh".to_string());

    manager.get_valid_token(&creds).await.unwrap();
    manager.get_valid_token(&other).await.unwrap();
    manager.get_valid_token(&creds).await.unwrap();
    assert_eq!(manager.acquisitions(), 2);
}

#[tokio::test]
async fn test_endpoint_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .mount(&server)
        .await;

    let err = CredentialManager::new()
        .acquire_token(&credentials(&server))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AuthError::EndpointStatus {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        }
    );
}

#[tokio::test]
async fn test_payload_without_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "Bearer"})))
        .mount(&server)
        .await;

    let err = CredentialManager::new()
        .acquire_token(&credentials(&server))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let creds = ClientCredentials::refresh("http://127.0.0.1:9/token", "cid", "secret", "rt");

    let err = CredentialManager::new()
        .timeout(Duration::from_secs(2))
        .acquire_token(&creds)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Unreachable(_)));
}

#[tokio::test]
async fn test_token_for_publishes_into_environment() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-env", 3600).await;

    let mut env = environment(&server);
    let token = CredentialManager::new().token_for(&mut env).await.unwrap();

    assert_eq!(env.get("access_token"), Some("tok-env"));
    assert_eq!(env.get("token_type"), Some("Bearer"));
    assert_eq!(
        env.get("token_expires_at"),
        Some(token.expires_at.to_rfc3339().as_str())
    );
}
