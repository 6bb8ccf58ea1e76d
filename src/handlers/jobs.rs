//! # Sync Job Handlers
//!
//! Trigger endpoints for the incremental sync and historical backfill jobs,
//! plus the combined progress/status view.
//!
//! Triggers return 202 immediately and run the job in a background task. The
//! single-flight guard is claimed before spawning, so a concurrent trigger
//! observes 409 synchronously and never touches the running job's progress.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::server::AppState;
use crate::sync::JobKind;
use crate::sync::backfill::{BackfillConfig, HistoricalBackfillJob};
use crate::sync::coordinator::SyncCoordinator;
use crate::sync::progress::ProgressSnapshot;
use crate::sync::state::SyncStateStore;

/// Request body for triggering an incremental sync
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct IncrementalSyncRequest {
    /// Re-fetch the full order history instead of starting at the watermark
    #[serde(default)]
    pub full_refresh: bool,
}

/// Request body for triggering a historical backfill
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BackfillRequest {
    /// First business date to fetch (default: configured earliest date)
    #[schema(example = "2018-01-01")]
    pub start_date: Option<NaiveDate>,
    /// Exclusive upper bound date (default: today)
    #[schema(example = "2024-01-01")]
    pub end_date: Option<NaiveDate>,
    /// Window width in days (default: configured chunk size)
    #[schema(example = 30)]
    pub chunk_size_days: Option<u32>,
    /// Job-local request throttle (default: configured backfill rate)
    #[schema(example = 100)]
    pub max_requests_per_minute: Option<u32>,
}

/// Acknowledgement that a job was accepted and started
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobAccepted {
    /// Kind of job that was started
    pub job_kind: JobKind,
    /// Human-readable confirmation
    pub message: String,
}

/// Last successful sync information for one entity type
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EntityStateInfo {
    /// Entity type slug
    #[schema(example = "items")]
    pub entity_type: String,
    /// Timestamp of the last successful sync (RFC 3339)
    pub last_sync_at: String,
    /// Records processed in the last run
    pub records_synced: i64,
    /// Duration of the last run in milliseconds
    pub duration_ms: i64,
}

/// Combined status of both job kinds plus per-entity bookkeeping
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SyncStatusResponse {
    /// Progress of the incremental sync job
    pub incremental_sync: ProgressSnapshot,
    /// Progress of the historical backfill job
    pub historical_backfill: ProgressSnapshot,
    /// Last successful run per entity type
    pub entity_states: Vec<EntityStateInfo>,
}

/// Trigger an incremental catalog and order sync
#[utoipa::path(
    post,
    path = "/sync/incremental",
    request_body = IncrementalSyncRequest,
    responses(
        (status = 202, description = "Sync started", body = JobAccepted),
        (status = 409, description = "An incremental sync is already running", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn trigger_incremental_sync(
    State(state): State<AppState>,
    body: Option<Json<IncrementalSyncRequest>>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    let Json(request) = body.unwrap_or_default();

    // Claim the single-flight guard before spawning so a concurrent trigger
    // gets its 409 here, not inside the task.
    let guard = state.incremental_progress.try_start()?;

    let coordinator = SyncCoordinator::new(
        Arc::clone(&state.db),
        Arc::clone(&state.client),
        Arc::clone(&state.dispatcher),
        state.config.backfill.earliest_date,
    );
    let full_refresh = request.full_refresh;
    info!(full_refresh, "Incremental sync triggered");
    tokio::spawn(async move {
        coordinator.run(guard, full_refresh).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_kind: JobKind::IncrementalSync,
            message: "incremental sync started".to_string(),
        }),
    ))
}

/// Trigger a historical order backfill over a date range
#[utoipa::path(
    post,
    path = "/sync/backfill",
    request_body = BackfillRequest,
    responses(
        (status = 202, description = "Backfill started", body = JobAccepted),
        (status = 400, description = "Invalid date range", body = ApiError),
        (status = 409, description = "A backfill is already running", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn trigger_historical_backfill(
    State(state): State<AppState>,
    body: Option<Json<BackfillRequest>>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    let Json(request) = body.unwrap_or_default();

    let config = BackfillConfig::resolve(
        &state.config.backfill,
        request.start_date,
        request.end_date,
        request.chunk_size_days,
        request.max_requests_per_minute,
    )?;
    let guard = state.backfill_progress.try_start()?;

    let job = HistoricalBackfillJob::new(
        Arc::clone(&state.db),
        Arc::clone(&state.client),
        Arc::clone(&state.dispatcher),
        state.shutdown.child_token(),
    );
    info!(
        start = %config.start_date,
        end = %config.end_date,
        chunk_size_days = config.chunk_size_days,
        "Historical backfill triggered"
    );
    tokio::spawn(async move {
        job.run(guard, config).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_kind: JobKind::HistoricalBackfill,
            message: "historical backfill started".to_string(),
        }),
    ))
}

/// Progress of both job kinds and per-entity sync bookkeeping
#[utoipa::path(
    get,
    path = "/sync/status",
    responses(
        (status = 200, description = "Current sync status", body = SyncStatusResponse)
    ),
    tag = "sync"
)]
pub async fn sync_status(
    State(state): State<AppState>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let store = SyncStateStore::new(Arc::clone(&state.db));
    let entity_states = store
        .list_all()
        .await?
        .into_iter()
        .map(|row| EntityStateInfo {
            entity_type: row.entity_type,
            last_sync_at: row.last_sync_at.to_rfc3339(),
            records_synced: row.records_synced,
            duration_ms: row.duration_ms,
        })
        .collect();

    Ok(Json(SyncStatusResponse {
        incremental_sync: state.incremental_progress.snapshot(),
        historical_backfill: state.backfill_progress.snapshot(),
        entity_states,
    }))
}
