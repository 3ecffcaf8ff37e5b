#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use api_test_runner::{Collection, CollectionLoader, Environment, RunOptions};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/oauth/token";

pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

pub fn write_file(dir: &Path, filename: &str, content: &str) -> PathBuf {
    let path = dir.join(filename);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

pub fn parse_collection(yaml: &str) -> Collection {
    CollectionLoader::parse_collection(yaml, "test").expect("Failed to parse collection")
}

/// Options with no delay, so tests stay fast
pub fn fast_options() -> RunOptions {
    RunOptions {
        delay_ms: 0,
        timeout_ms: 2000,
        ..RunOptions::default()
    }
}

/// Environment pointing at a mock server, with OAuth credentials
pub fn environment(server: &MockServer) -> Environment {
    let mut env: Environment = [
        ("client_id", "test-client"),
        ("client_secret", "test-secret"),
        ("refresh_token", "test-refresh"),
    ]
    .into_iter()
    .collect();
    env.set("base_url", server.uri());
    env.set("token_url", format!("{}{}", server.uri(), TOKEN_PATH));
    env
}

/// Token endpoint issuing `access_token` valid for `expires_in` seconds
pub async fn mount_token_endpoint(server: &MockServer, access_token: &str, expires_in: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": expires_in,
        })))
        .mount(server)
        .await;
}

/// `GET <route>` answering `status` with a small JSON body
pub async fn mount_json(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"id": 1, "ok": status < 400})))
        .mount(server)
        .await;
}

/// One-folder collection whose requests hit `/r1`, `/r2`, ...
pub fn numbered_collection(count: usize) -> String {
    let requests: String = (1..=count)
        .map(|i| {
            format!(
                r#"
      - name: Request {i}
        url: "{{{{base_url}}}}/r{i}"
        assertions:
          - status: 200
"#
            )
        })
        .collect();

    format!(
        r#"
name: numbered
folders:
  - name: Main
    requests:{}"#,
        requests
    )
}

/// Collection with the smoke folders interleaved with others
pub fn smoke_collection() -> &'static str {
    r#"
name: mixed
folders:
  - name: Setup
    requests:
      - name: Health
        url: "{{base_url}}/health"
        auth: none
  - name: Authentication
    requests:
      - name: Login check
        url: "{{base_url}}/auth/check"
        assertions:
          - status: 200
  - name: Orders
    requests:
      - name: List orders
        url: "{{base_url}}/orders"
  - name: Profile & User Info
    requests:
      - name: Me
        url: "{{base_url}}/me"
        assertions:
          - status: 200
          - json_field: id
"#
}
