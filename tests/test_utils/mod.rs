//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use merchsync::client::{RateLimiter, UpstreamClient};
use merchsync::config::UpstreamConfig;
use merchsync::migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Every list endpoint the sync engine touches.
pub const ALL_PATHS: [&str; 7] = [
    "/v1/locations",
    "/v1/catalog/categories",
    "/v1/catalog/items",
    "/v1/catalog/variations",
    "/v1/inventory/counts",
    "/v1/vendors",
    "/v1/orders",
];

/// Fresh in-memory database with all migrations applied.
pub async fn test_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    Arc::new(db)
}

/// Upstream config pointed at a mock server, tuned so tests do not wait on
/// rate limiting or retry backoff.
pub fn test_upstream_config(base_url: &str) -> UpstreamConfig {
    UpstreamConfig {
        base_url: base_url.to_string(),
        access_token: Some("test-token".to_string()),
        timeout_seconds: 5,
        max_retries: 0,
        requests_per_minute: 60_000,
        page_size: 100,
    }
}

/// Client pointed at the mock server with its own rate limiter.
pub fn test_client(base_url: &str) -> Arc<UpstreamClient> {
    let config = test_upstream_config(base_url);
    let limiter = RateLimiter::new(config.requests_per_minute);
    Arc::new(UpstreamClient::new(config, limiter).expect("build test client"))
}

/// A successful list response body.
pub fn records_response(records: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "records": records }))
}

/// Low-priority fallback returning an empty record set for every endpoint,
/// so tests only need to mount the endpoints they care about.
pub async fn mount_empty_fallbacks(server: &MockServer) {
    for endpoint in ALL_PATHS {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(records_response(json!([])))
            .with_priority(50)
            .mount(server)
            .await;
    }
}
