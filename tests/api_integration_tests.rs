//! Integration tests for the merchsync HTTP trigger surface.

mod test_utils;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use merchsync::client::{RateLimiter, UpstreamClient};
use merchsync::config::AppConfig;
use merchsync::notify::TracingDispatcher;
use merchsync::server::{AppState, create_app};
use reqwest::Client;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start the app on a random port, wired to the given mock upstream.
async fn start_test_server(upstream_url: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    let db = test_utils::test_db().await;
    let upstream = test_utils::test_upstream_config(upstream_url);
    let limiter = RateLimiter::new(upstream.requests_per_minute);
    let client = Arc::new(UpstreamClient::new(upstream.clone(), limiter).unwrap());

    let config = AppConfig {
        upstream,
        ..AppConfig::default()
    };
    let state = AppState::new(config, db, client, Arc::new(TracingDispatcher));
    let app = create_app(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn root_endpoint_returns_service_info() {
    let upstream = MockServer::start().await;
    let server_url = start_test_server(&upstream.uri()).await;
    let client = Client::new();

    let response = client
        .get(format!("{server_url}/"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["service"], "merchsync");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn openapi_spec_is_served() {
    let upstream = MockServer::start().await;
    let server_url = start_test_server(&upstream.uri()).await;
    let client = Client::new();

    let response = client
        .get(format!("{server_url}/openapi.json"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body["paths"]["/sync/incremental"].is_object());
    assert!(body["paths"]["/sync/backfill"].is_object());
    assert!(body["paths"]["/sync/status"].is_object());
}

#[tokio::test]
async fn status_is_idle_before_any_job() {
    let upstream = MockServer::start().await;
    let server_url = start_test_server(&upstream.uri()).await;
    let client = Client::new();

    let response = client
        .get(format!("{server_url}/sync/status"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["incremental_sync"]["is_running"], false);
    assert_eq!(body["historical_backfill"]["is_running"], false);
    assert_eq!(body["entity_states"], json!([]));
}

#[tokio::test]
async fn backfill_with_inverted_range_is_rejected() {
    let upstream = MockServer::start().await;
    let server_url = start_test_server(&upstream.uri()).await;
    let client = Client::new();

    let response = client
        .post(format!("{server_url}/sync/backfill"))
        .json(&json!({"start_date": "2023-05-01", "end_date": "2023-04-01"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/problem+json"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_FAILED");

    // The rejected request must not have claimed the job slot.
    let status: Value = client
        .get(format!("{server_url}/sync/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["historical_backfill"]["is_running"], false);
}

#[tokio::test]
async fn concurrent_incremental_trigger_conflicts() {
    let upstream = MockServer::start().await;
    test_utils::mount_empty_fallbacks(&upstream).await;
    // Slow first endpoint keeps the job running while the second trigger
    // arrives.
    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"records": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .with_priority(1)
        .mount(&upstream)
        .await;

    let server_url = start_test_server(&upstream.uri()).await;
    let client = Client::new();

    let first = client
        .post(format!("{server_url}/sync/incremental"))
        .json(&json!({"full_refresh": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 202);
    let body: Value = first.json().await.unwrap();
    assert_eq!(body["job_kind"], "incremental_sync");

    let second = client
        .post(format!("{server_url}/sync/incremental"))
        .json(&json!({"full_refresh": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["code"], "JOB_ALREADY_RUNNING");

    // A backfill is a different job kind and is not blocked by the running
    // incremental sync.
    let status: Value = client
        .get(format!("{server_url}/sync/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["incremental_sync"]["is_running"], true);
    assert_eq!(status["historical_backfill"]["is_running"], false);
}

#[tokio::test]
async fn trigger_without_a_body_uses_defaults() {
    let upstream = MockServer::start().await;
    test_utils::mount_empty_fallbacks(&upstream).await;
    let server_url = start_test_server(&upstream.uri()).await;
    let client = Client::new();

    let response = client
        .post(format!("{server_url}/sync/incremental"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
}
