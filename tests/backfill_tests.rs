//! Integration tests for the chunked historical backfill job.

mod test_utils;

use std::sync::Arc;

use chrono::NaiveDate;
use merchsync::config::BackfillDefaults;
use merchsync::models::order;
use merchsync::notify::TracingDispatcher;
use merchsync::sync::backfill::{BackfillConfig, HistoricalBackfillJob};
use merchsync::sync::progress::ProgressTracker;
use merchsync::sync::{JobKind, SyncRunResult};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn backfill_config(start: &str, end: &str) -> BackfillConfig {
    // High job-local rate so tests never wait on limiter spacing.
    BackfillConfig::resolve(
        &BackfillDefaults::default(),
        Some(date(start)),
        Some(date(end)),
        Some(30),
        Some(60_000),
    )
    .unwrap()
}

async fn run_backfill(
    db: &Arc<DatabaseConnection>,
    server: &MockServer,
    config: BackfillConfig,
    cancel: CancellationToken,
) -> SyncRunResult {
    let client = test_utils::test_client(&server.uri());
    let job = HistoricalBackfillJob::new(
        Arc::clone(db),
        client,
        Arc::new(TracingDispatcher),
        cancel,
    );
    let tracker = ProgressTracker::new(JobKind::HistoricalBackfill);
    let guard = tracker.try_start().unwrap();
    job.run(guard, config).await
}

/// Matcher for the order fetch of one backfill window, by its begin time.
fn window(begin: &str) -> wiremock::MockBuilder {
    Mock::given(method("GET"))
        .and(path("/v1/orders"))
        .and(query_param("begin_time", format!("{begin}T00:00:00+00:00")))
}

fn order_record(id: &str, created_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "state": "COMPLETED",
        "created_at": created_at,
        "line_items": [{"uid": format!("{id}_li"), "name": "Latte", "quantity": "1"}]
    })
}

#[tokio::test]
async fn failed_window_is_recorded_and_later_windows_still_run() {
    let db = test_utils::test_db().await;
    let server = MockServer::start().await;

    // Three 30-day windows; the middle one fails persistently.
    window("2023-01-01")
        .respond_with(test_utils::records_response(json!([
            order_record("ord_1", "2023-01-05T09:00:00Z"),
            order_record("ord_2", "2023-01-20T12:00:00Z")
        ])))
        .mount(&server)
        .await;
    window("2023-01-31")
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    window("2023-03-02")
        .respond_with(test_utils::records_response(json!([
            order_record("ord_4", "2023-03-10T15:00:00Z")
        ])))
        .mount(&server)
        .await;

    let config = backfill_config("2023-01-01", "2023-03-15");
    let result = run_backfill(&db, &server, config, CancellationToken::new()).await;

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("2023-01-31"), "{:?}", result.errors);
    // The failed middle window does not count as completed.
    assert_eq!(result.completed_chunks, 2);
    assert_eq!(result.per_entity["orders"].created, 3);

    // Both surviving windows are fully persisted.
    let orders = order::Entity::find().all(db.as_ref()).await.unwrap();
    let mut ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["ord_1", "ord_2", "ord_4"]);
}

#[tokio::test]
async fn window_pages_are_drained_through_the_cursor() {
    let db = test_utils::test_db().await;
    let server = MockServer::start().await;

    window("2023-01-01")
        .and(query_param("cursor", "page2"))
        .respond_with(test_utils::records_response(json!([
            order_record("ord_3", "2023-01-25T08:00:00Z")
        ])))
        .with_priority(1)
        .mount(&server)
        .await;
    window("2023-01-01")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                order_record("ord_1", "2023-01-05T09:00:00Z"),
                order_record("ord_2", "2023-01-10T10:00:00Z")
            ],
            "cursor": "page2"
        })))
        .mount(&server)
        .await;

    let config = backfill_config("2023-01-01", "2023-01-20");
    let result = run_backfill(&db, &server, config, CancellationToken::new()).await;

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.per_entity["orders"].fetched, 3);
    assert_eq!(result.per_entity["orders"].created, 3);
}

#[tokio::test]
async fn rerunning_a_window_is_idempotent() {
    let db = test_utils::test_db().await;
    let server = MockServer::start().await;

    window("2023-01-01")
        .respond_with(test_utils::records_response(json!([
            order_record("ord_1", "2023-01-05T09:00:00Z")
        ])))
        .mount(&server)
        .await;

    let first = run_backfill(
        &db,
        &server,
        backfill_config("2023-01-01", "2023-01-20"),
        CancellationToken::new(),
    )
    .await;
    assert_eq!(first.per_entity["orders"].created, 1);

    let second = run_backfill(
        &db,
        &server,
        backfill_config("2023-01-01", "2023-01-20"),
        CancellationToken::new(),
    )
    .await;
    assert_eq!(second.per_entity["orders"].created, 0);
    assert_eq!(second.per_entity["orders"].updated, 0);
    assert_eq!(second.total_changes, 0);
    assert_eq!(order::Entity::find().all(db.as_ref()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn cancelled_job_stops_before_the_next_window() {
    let db = test_utils::test_db().await;
    let server = MockServer::start().await;
    test_utils::mount_empty_fallbacks(&server).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = run_backfill(
        &db,
        &server,
        backfill_config("2023-01-01", "2023-03-15"),
        cancel,
    )
    .await;

    assert!(!result.success);
    assert_eq!(result.per_entity["orders"].fetched, 0);
    assert!(result.errors[0].contains("cancelled"));
}
