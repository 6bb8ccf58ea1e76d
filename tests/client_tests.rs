//! Integration tests for the upstream client's retry and error
//! classification behavior.

mod test_utils;

use std::time::{Duration, Instant};

use merchsync::client::{FetchFilter, RateLimiter, UpstreamClient};
use merchsync::error::SyncError;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn retrying_client(base_url: &str, max_retries: u32) -> UpstreamClient {
    let mut config = test_utils::test_upstream_config(base_url);
    config.max_retries = max_retries;
    let limiter = RateLimiter::new(config.requests_per_minute);
    UpstreamClient::new(config, limiter).unwrap()
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(test_utils::records_response(json!([{"id": "loc_1", "name": "Main"}])))
        .mount(&server)
        .await;

    let client = retrying_client(&server.uri(), 3);
    let page = client
        .fetch_page("locations", &FetchFilter::default(), None)
        .await
        .unwrap();
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn rate_limit_retry_after_hint_is_honored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(test_utils::records_response(json!([])))
        .mount(&server)
        .await;

    let client = retrying_client(&server.uri(), 1);
    let started = Instant::now();
    client
        .fetch_page("locations", &FetchFilter::default(), None)
        .await
        .unwrap();
    // The hint (1s) exceeds the base backoff (~500ms) and must win.
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn client_errors_fail_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such endpoint"))
        .expect(1)
        .mount(&server)
        .await;

    let client = retrying_client(&server.uri(), 3);
    let err = client
        .fetch_page("locations", &FetchFilter::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::FatalRequest { status: 404, .. }));
}

#[tokio::test]
async fn undecodable_body_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = retrying_client(&server.uri(), 3);
    let err = client
        .fetch_page("locations", &FetchFilter::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::MalformedPayload(_)));
}

#[tokio::test]
async fn requests_carry_auth_and_filter_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/orders"))
        .and(header("Authorization", "Bearer test-token"))
        .and(query_param("limit", "100"))
        .and(query_param("begin_time", "2023-01-01T00:00:00+00:00"))
        .and(query_param("location_id", "loc_1"))
        .respond_with(test_utils::records_response(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = retrying_client(&server.uri(), 0);
    let filter = FetchFilter {
        begin_time: Some("2023-01-01T00:00:00Z".parse().unwrap()),
        end_time: None,
        location_id: Some("loc_1".to_string()),
    };
    client.fetch_page("orders", &filter, None).await.unwrap();
}
