//! Common test utilities and helpers

use std::sync::Arc;
use std::time::Duration;
use storefront_client::auth::CredentialStore;
use storefront_client::{Client, ClientBuilder};
use wiremock::MockServer;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

/// Builder pointed at `server` with delays short enough for real-time tests.
#[allow(dead_code)]
pub fn builder(server: &MockServer) -> ClientBuilder {
    init_tracing();
    Client::builder()
        .base_url(server.uri())
        .base_delay(Duration::from_millis(10))
}

/// Client pointed at `server` backed by `store`.
#[allow(dead_code)]
pub async fn client(server: &MockServer, store: Arc<dyn CredentialStore>) -> Client {
    builder(server)
        .credential_store(store)
        .build()
        .await
        .expect("Failed to build client")
}

/// Mount a refresh endpoint exchanging `refresh_token` for `access_token`,
/// expected to be hit exactly `times` times.
#[allow(dead_code)]
pub async fn mount_refresh(
    server: &MockServer,
    refresh_token: &str,
    response: ResponseTemplate,
    times: u64,
) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(serde_json::json!({ "refreshToken": refresh_token })))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

/// Authorization headers of every request the server received for `route`.
#[allow(dead_code)]
pub async fn authorizations(server: &MockServer, route: &str) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .map(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .collect()
}

/// Route test logs through the test writer; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
