//! Client facade: request shaping, typed bodies and error messages

mod common;

use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use storefront_client::auth::MemoryStore;
use storefront_client::http::Method;
use storefront_client::{CancelHandle, Client, ClientConfig, Error, RequestOptions};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddItem {
    product_id: String,
    quantity: u32,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Cart {
    id: String,
    item_count: u32,
    total: f64,
}

#[tokio::test]
async fn test_typed_post_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/cart/items"))
        .and(header("content-type", "application/json"))
        .and(header("x-store-id", "eu-1"))
        .and(body_json(serde_json::json!({"productId": "p-7", "quantity": 2})))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "c-1",
            "itemCount": 2,
            "total": 39.8
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(format!("{}/api", server.uri()))
        .default_header("x-store-id", "eu-1")
        .unwrap()
        .build()
        .await
        .expect("Failed to build client");

    let response = client
        .post(
            "/cart/items",
            &AddItem {
                product_id: "p-7".to_string(),
                quantity: 2,
            },
        )
        .await
        .expect("Request failed");

    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(
        response.parse::<Cart>().unwrap(),
        Cart {
            id: "c-1".to_string(),
            item_count: 2,
            total: 39.8,
        }
    );
    server.verify().await;
}

#[tokio::test]
async fn test_patch_and_empty_delete() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/cart/items/3"))
        .and(body_json(serde_json::json!({"quantity": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"quantity": 5})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/cart/items/3"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(&server, Arc::new(MemoryStore::new())).await;

    let patched = client
        .patch("/cart/items/3", &serde_json::json!({"quantity": 5}))
        .await
        .expect("Request failed");
    assert_eq!(patched.body()["quantity"], 5);

    let deleted = client.delete("/cart/items/3").await.expect("Request failed");
    assert_eq!(deleted.status().as_u16(), 204);
    assert!(deleted.body().is_null());

    server.verify().await;
}

#[tokio::test]
async fn test_status_messages_when_backend_is_silent() {
    let server = MockServer::start().await;

    for status in [400u16, 403, 404, 422] {
        Mock::given(method("GET"))
            .and(path(format!("/status/{}", status)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    let client = common::client(&server, Arc::new(MemoryStore::new())).await;
    let mut messages = Vec::new();
    for status in [400u16, 403, 404, 422] {
        let err = client
            .get(&format!("/status/{}", status))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(status));
        assert_eq!(err.kind_label(), "client_error");
        messages.push(err.message());
    }

    assert_eq!(
        messages,
        vec![
            "Invalid request. Please check your input and try again.",
            "You do not have permission to perform this action.",
            "The requested resource was not found.",
            "Validation failed. Please check the submitted data.",
        ]
    );
}

#[tokio::test]
async fn test_server_supplied_message_wins() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/coupons/apply"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(serde_json::json!({"error": {"message": "Coupon SPRING expired"}})),
        )
        .mount(&server)
        .await;

    let client = common::client(&server, Arc::new(MemoryStore::new())).await;
    let err = client
        .post("/coupons/apply", &serde_json::json!({"code": "SPRING"}))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Client { status: 422, .. }));
    assert_eq!(err.message(), "Coupon SPRING expired");
    assert_eq!(err.to_string(), "Coupon SPRING expired");
}

#[tokio::test]
async fn test_unreadable_success_body_is_unknown_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/maintenance"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>back soon</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::client(&server, Arc::new(MemoryStore::new())).await;
    let err = client.get("/maintenance").await.unwrap_err();

    assert!(matches!(err, Error::Unknown { status: Some(200), .. }), "got {:?}", err);
    assert_eq!(err.kind_label(), "unknown");
    assert!(!err.is_retryable());
    assert!(!err.message().is_empty());
    server.verify().await;
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reports/yearly"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let client = common::client(&server, Arc::new(MemoryStore::new())).await;
    let handle = CancelHandle::new();
    let options = RequestOptions::new().cancel_with(handle.clone());

    let call = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .request(Method::GET, "/reports/yearly", None, options)
                .await
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), call)
        .await
        .expect("cancellation did not abort the call")
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_from_config() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(header("user-agent", "storefront-tests/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!("pong")))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::builder()
        .base_url(server.uri())
        .user_agent("storefront-tests/1.0")
        .build();
    let client = Client::from_config(config)
        .await
        .expect("Failed to build client");

    let response = client.get("/ping").await.expect("Request failed");
    assert_eq!(response.parse::<String>().unwrap(), "pong");
    server.verify().await;
}
