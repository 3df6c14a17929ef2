//! Retry, backoff and timeout escalation against a real HTTP server

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};
use storefront_client::auth::MemoryStore;
use storefront_client::{Client, Error, FailureKind, REQUEST_ID_HEADER};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_server_errors_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": "p-1"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(&server, Arc::new(MemoryStore::new())).await;
    let started = Instant::now();
    let response = client.get("/products").await.expect("Request failed");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.body()[0]["id"], "p-1");
    assert_eq!(response.retries_taken(), 3);
    // 10ms + 20ms + 30ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(60));

    server.verify().await;
}

#[tokio::test]
async fn test_every_attempt_shares_one_request_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let client = common::client(&server, Arc::new(MemoryStore::new())).await;
    client.get("/cart").await.expect("Request failed");
    client.get("/cart").await.expect("Request failed");

    let ids: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.headers[REQUEST_ID_HEADER].to_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(ids[0], ids[1]);
    assert_eq!(ids[1], ids[2]);
    assert_ne!(ids[2], ids[3]);
}

#[tokio::test]
async fn test_rate_limit_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/coupons/apply"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "3")
                .set_body_json(serde_json::json!({"message": "Slow down"})),
        )
        .expect(4)
        .mount(&server)
        .await;

    let client = common::client(&server, Arc::new(MemoryStore::new())).await;
    let err = client
        .post("/coupons/apply", &serde_json::json!({"code": "SPRING"}))
        .await
        .unwrap_err();

    match err {
        Error::RateLimited {
            message,
            retry_after,
        } => {
            assert_eq!(message, "Slow down");
            assert_eq!(retry_after, Some(Duration::from_secs(3)));
        }
        other => panic!("Expected RateLimited, got {:?}", other),
    }

    server.verify().await;
}

#[tokio::test]
async fn test_max_retries_is_configurable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/inventory"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let client = common::builder(&server)
        .max_retries(1)
        .build()
        .await
        .expect("Failed to build client");
    let err = client.get("/inventory").await.unwrap_err();

    assert_eq!(err.failure_kind(), Some(FailureKind::ServerError));
    assert_eq!(err.status(), Some(502));
    server.verify().await;
}

#[tokio::test]
async fn test_timeout_escalates_for_slow_backend() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reports"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"ready": true}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    // Attempt timeouts: 200ms, 200ms, then 400ms.
    let client = common::builder(&server)
        .timeout(Duration::from_millis(200))
        .build()
        .await
        .expect("Failed to build client");
    let response = client.get("/reports").await.expect("Request failed");

    assert_eq!(response.body()["ready"], true);
    assert_eq!(response.retries_taken(), 2);
}

#[tokio::test]
async fn test_timeouts_surface_as_timeout_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = common::builder(&server)
        .timeout(Duration::from_millis(100))
        .max_retries(1)
        .build()
        .await
        .expect("Failed to build client");
    let err = client.get("/reports").await.unwrap_err();

    assert!(matches!(err, Error::Timeout(_)), "got {:?}", err);
    assert_eq!(err.kind_label(), "timeout");
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    common::init_tracing();
    let client = Client::builder()
        .base_url("http://127.0.0.1:1")
        .base_delay(Duration::from_millis(5))
        .build()
        .await
        .expect("Failed to build client");

    let err = client.get("/products").await.unwrap_err();
    assert!(matches!(err, Error::Network(_)), "got {:?}", err);
    assert!(err.is_retryable());
    assert!(!err.message().is_empty());
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/cart/items/9"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(&server, Arc::new(MemoryStore::new())).await;
    let err = client.delete("/cart/items/9").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.message(), "The requested resource was not found.");
    server.verify().await;
}
