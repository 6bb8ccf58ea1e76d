//! Chunked historical order backfill.
//!
//! The full history is partitioned into fixed-width date windows processed
//! oldest first. Each window is fetched page by page and flushed to the
//! database in batches, so an interrupted or partially failed run leaves
//! every finished window fully persisted. A failed window is recorded and
//! the job moves on; only errors that would doom every later request stop
//! the run.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::client::records::UpstreamOrder;
use crate::client::{FetchFilter, RateLimiter, UpstreamClient};
use crate::config::BackfillDefaults;
use crate::error::SyncError;
use crate::notify::{JobResult, NotificationDispatcher};
use crate::sync::orders::upsert_order_tree;
use crate::sync::progress::JobGuard;
use crate::sync::{EntityStats, EntityType, SyncRunResult};

/// Resolved parameters for one backfill run.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// First business date to fetch (inclusive).
    pub start_date: NaiveDate,
    /// Upper bound date (exclusive).
    pub end_date: NaiveDate,
    /// Width of each window in days.
    pub chunk_size_days: u32,
    /// Orders accumulated before each database flush.
    pub batch_size: usize,
    /// Job-local throttle layered over the shared request budget.
    pub max_requests_per_minute: u32,
}

impl BackfillConfig {
    /// Merge request overrides onto the configured defaults and validate.
    pub fn resolve(
        defaults: &BackfillDefaults,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        chunk_size_days: Option<u32>,
        max_requests_per_minute: Option<u32>,
    ) -> Result<Self, SyncError> {
        let config = Self {
            start_date: start_date.unwrap_or(defaults.earliest_date),
            end_date: end_date.unwrap_or_else(|| Utc::now().date_naive()),
            chunk_size_days: chunk_size_days.unwrap_or(defaults.chunk_size_days),
            batch_size: defaults.batch_size,
            max_requests_per_minute: max_requests_per_minute
                .unwrap_or(defaults.max_requests_per_minute),
        };

        if config.chunk_size_days == 0 {
            return Err(SyncError::InvalidRange(
                "chunk_size_days must be at least 1".to_string(),
            ));
        }
        if config.start_date >= config.end_date {
            return Err(SyncError::InvalidRange(format!(
                "start_date {} must precede end_date {}",
                config.start_date, config.end_date
            )));
        }
        if config.batch_size == 0 {
            return Err(SyncError::InvalidRange(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if config.max_requests_per_minute == 0 {
            return Err(SyncError::InvalidRange(
                "max_requests_per_minute must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Split `[start, end)` into consecutive half-open windows of at most
/// `chunk_days` days, oldest first.
pub fn partition_range(
    start: NaiveDate,
    end: NaiveDate,
    chunk_days: u32,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = cursor
            .checked_add_days(Days::new(chunk_days as u64))
            .unwrap_or(end)
            .min(end);
        windows.push((day_start(cursor), day_start(next)));
        cursor = next;
    }
    windows
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub struct HistoricalBackfillJob {
    db: Arc<DatabaseConnection>,
    client: Arc<UpstreamClient>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    cancel: CancellationToken,
}

impl HistoricalBackfillJob {
    pub fn new(
        db: Arc<DatabaseConnection>,
        client: Arc<UpstreamClient>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            db,
            client,
            dispatcher,
            cancel,
        }
    }

    /// Run the backfill to completion over the configured date range.
    ///
    /// Cancellation is honored between windows only; an in-flight window
    /// always finishes or fails as a unit.
    #[instrument(skip(self, guard, config),
        fields(start = %config.start_date, end = %config.end_date))]
    pub async fn run(&self, guard: JobGuard, config: BackfillConfig) -> SyncRunResult {
        let started = Instant::now();
        let windows = partition_range(config.start_date, config.end_date, config.chunk_size_days);
        guard.set_total_chunks(windows.len() as u64);
        info!(
            windows = windows.len(),
            chunk_size_days = config.chunk_size_days,
            "Starting historical backfill"
        );

        let local_limiter = RateLimiter::new(config.max_requests_per_minute);
        let mut result = SyncRunResult::default();
        let mut order_stats = EntityStats::default();

        for (index, (begin, end)) in windows.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(remaining = windows.len() - index, "Backfill cancelled between windows");
                result.errors.push("cancelled before completion".to_string());
                break;
            }

            let label = format!("{} to {}", begin.date_naive(), end.date_naive());
            guard.start_chunk(label.clone());

            match self
                .backfill_window(*begin, *end, &config, &local_limiter)
                .await
            {
                Ok(stats) => {
                    guard.add_records(stats.total_changes());
                    order_stats.fetched += stats.fetched;
                    order_stats.created += stats.created;
                    order_stats.updated += stats.updated;
                    guard.complete_chunk();
                    result.completed_chunks += 1;
                }
                Err(err) if err.is_fatal() => {
                    error!(window = %label, error = %err, "Backfill aborted, request rejected");
                    let message = format!("window {label}: {err}");
                    guard.fail_chunk(message.clone());
                    result.errors.push(message);
                    break;
                }
                Err(err) => {
                    warn!(window = %label, error = %err, "Backfill window failed, continuing");
                    let message = format!("window {label}: {err}");
                    guard.fail_chunk(message.clone());
                    result.errors.push(message);
                }
            }
        }

        result.success = result.errors.is_empty();
        result.total_changes = order_stats.total_changes();
        result
            .per_entity
            .insert(EntityType::Order.slug().to_string(), order_stats);
        result.duration_seconds = started.elapsed().as_secs_f64();

        self.dispatcher
            .dispatch(&JobResult::new(guard.kind(), result.clone()))
            .await;
        result
    }

    /// Fetch one date window page by page, flushing in batches.
    async fn backfill_window(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        config: &BackfillConfig,
        local_limiter: &RateLimiter,
    ) -> Result<EntityStats, SyncError> {
        let filter = FetchFilter::date_range(begin, end);
        let mut stats = EntityStats::default();
        let mut batch: Vec<UpstreamOrder> = Vec::with_capacity(config.batch_size);
        let mut cursor: Option<String> = None;

        loop {
            local_limiter.acquire().await;
            let page = self
                .client
                .fetch_page(EntityType::Order.upstream_path(), &filter, cursor.as_deref())
                .await?;

            for raw in page.records {
                let record: UpstreamOrder = serde_json::from_value(raw)
                    .map_err(|e| SyncError::MalformedPayload(format!("order record: {e}")))?;
                stats.fetched += 1;
                batch.push(record);
                if batch.len() >= config.batch_size {
                    self.flush(std::mem::take(&mut batch), &mut stats).await?;
                }
            }

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        if !batch.is_empty() {
            self.flush(batch, &mut stats).await?;
        }
        Ok(stats)
    }

    /// Write one batch of orders in a single transaction.
    async fn flush(
        &self,
        batch: Vec<UpstreamOrder>,
        stats: &mut EntityStats,
    ) -> Result<(), SyncError> {
        let now = Utc::now().into();
        let txn = self.db.begin().await?;
        for record in batch {
            let change = upsert_order_tree(&txn, record, now)
                .await
                .map_err(SyncError::promote_schema_mismatch)?;
            stats.record(change);
        }
        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn partition_splits_range_with_remainder() {
        let windows = partition_range(date("2023-01-01"), date("2023-03-15"), 30);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].0.date_naive(), date("2023-01-01"));
        assert_eq!(windows[0].1.date_naive(), date("2023-01-31"));
        assert_eq!(windows[1].1.date_naive(), date("2023-03-02"));
        // Final window is the remainder, narrower than the chunk width.
        assert_eq!(windows[2].1.date_naive(), date("2023-03-15"));
    }

    #[test]
    fn partition_windows_are_contiguous() {
        let windows = partition_range(date("2022-06-01"), date("2023-06-01"), 30);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn resolve_rejects_inverted_range() {
        let defaults = BackfillDefaults::default();
        let err = BackfillConfig::resolve(
            &defaults,
            Some(date("2023-05-01")),
            Some(date("2023-04-01")),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::InvalidRange(_)));
    }

    #[test]
    fn resolve_rejects_zero_chunk_width() {
        let defaults = BackfillDefaults::default();
        let err = BackfillConfig::resolve(&defaults, None, None, Some(0), None).unwrap_err();
        assert!(matches!(err, SyncError::InvalidRange(_)));
    }

    #[test]
    fn resolve_rejects_zero_request_rate() {
        let defaults = BackfillDefaults::default();
        let err = BackfillConfig::resolve(&defaults, None, None, None, Some(0)).unwrap_err();
        assert!(matches!(err, SyncError::InvalidRange(_)));
    }

    #[test]
    fn resolve_fills_defaults() {
        let defaults = BackfillDefaults::default();
        let config = BackfillConfig::resolve(&defaults, None, None, None, None).unwrap();
        assert_eq!(config.start_date, defaults.earliest_date);
        assert_eq!(config.chunk_size_days, defaults.chunk_size_days);
        assert_eq!(config.batch_size, defaults.batch_size);
        assert_eq!(
            config.max_requests_per_minute,
            defaults.max_requests_per_minute
        );
    }

    #[test]
    fn resolve_applies_request_rate_override() {
        let defaults = BackfillDefaults::default();
        let config = BackfillConfig::resolve(&defaults, None, None, None, Some(30)).unwrap();
        assert_eq!(config.max_requests_per_minute, 30);
    }
}
