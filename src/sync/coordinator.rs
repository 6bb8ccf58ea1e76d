//! Incremental sync coordination.
//!
//! Runs one full catalog reconciliation pass in fixed dependency order, then
//! an upsert-only order pass from the persisted watermark. A failed entity
//! type takes down only its dependents; independent entity types still sync.
//! A fatal error (bad credentials, rejected request shape) aborts the rest
//! of the run since every subsequent call would fail the same way.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::DatabaseConnection;
use tracing::{error, info, instrument, warn};

use crate::client::{FetchFilter, UpstreamClient};
use crate::notify::{JobResult, NotificationDispatcher};
use crate::sync::catalog::{
    CategorySync, InventorySync, ItemSync, LocationSync, VariationSync, VendorSync,
};
use crate::sync::orders::sync_orders;
use crate::sync::progress::JobGuard;
use crate::sync::reconcile::reconcile_entity;
use crate::sync::state::SyncStateStore;
use crate::sync::{EntityStats, EntityType, SyncRunResult};

pub struct SyncCoordinator {
    db: Arc<DatabaseConnection>,
    client: Arc<UpstreamClient>,
    state: SyncStateStore,
    dispatcher: Arc<dyn NotificationDispatcher>,
    /// Order watermark used when no sync_state row exists or a full refresh
    /// is requested.
    earliest_order_date: NaiveDate,
}

impl SyncCoordinator {
    pub fn new(
        db: Arc<DatabaseConnection>,
        client: Arc<UpstreamClient>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        earliest_order_date: NaiveDate,
    ) -> Self {
        let state = SyncStateStore::new(Arc::clone(&db));
        Self {
            db,
            client,
            state,
            dispatcher,
            earliest_order_date,
        }
    }

    /// Execute one incremental sync run to completion.
    ///
    /// The guard must already be held by the caller; acquiring it inside the
    /// spawned task would let two trigger requests race past the 409 check.
    #[instrument(skip(self, guard))]
    pub async fn run(&self, guard: JobGuard, full_refresh: bool) -> SyncRunResult {
        let started = Instant::now();
        let mut result = SyncRunResult::default();
        let mut failed: HashSet<EntityType> = HashSet::new();
        let mut aborted = false;

        // Catalog entities plus the trailing order pass.
        guard.set_total_chunks(EntityType::CATALOG_ORDER.len() as u64 + 1);

        match self.state.list_all().await {
            Ok(rows) => info!(
                known_entity_states = rows.len(),
                full_refresh, "Starting incremental sync run"
            ),
            Err(err) => warn!(error = %err, "Could not audit sync state at run start"),
        }

        for entity in EntityType::CATALOG_ORDER {
            if aborted {
                result.absorb(entity, aborted_stats());
                failed.insert(entity);
                continue;
            }
            if let Some(dep) = entity.dependencies().iter().find(|d| failed.contains(d)) {
                warn!(entity = %entity, dependency = %dep, "Skipping entity, dependency failed");
                result.absorb(entity, EntityStats::skipped(*dep));
                failed.insert(entity);
                continue;
            }

            guard.start_chunk(format!("syncing {entity}"));
            let entity_started = Instant::now();

            match self.reconcile(entity).await {
                Ok(stats) => {
                    guard.add_records(stats.total_changes());
                    guard.complete_chunk();
                    result.completed_chunks += 1;
                    self.record_success(entity, &stats, entity_started, Utc::now())
                        .await;
                    result.absorb(entity, stats);
                }
                Err(err) => {
                    error!(entity = %entity, error = %err, "Entity sync failed");
                    guard.fail_chunk(format!("{entity}: {err}"));
                    failed.insert(entity);
                    result.absorb(entity, EntityStats::failed(err.to_string()));
                    if err.is_fatal() {
                        aborted = true;
                    }
                }
            }
        }

        // Orders run last, upsert-only from the watermark.
        if aborted {
            result.absorb(EntityType::Order, aborted_stats());
        } else if failed.contains(&EntityType::Location) {
            result.absorb(
                EntityType::Order,
                EntityStats::skipped(EntityType::Location),
            );
        } else {
            guard.start_chunk("syncing orders".to_string());
            let entity_started = Instant::now();
            let filter = match self.order_filter(full_refresh).await {
                Ok(filter) => filter,
                Err(err) => {
                    warn!(error = %err, "Falling back to earliest order date");
                    FetchFilter::date_range(self.earliest_window_start(), Utc::now())
                }
            };
            // The next watermark is the fetch window's end, not the completion
            // time; orders created upstream while this pass was writing fall
            // inside the next run's window instead of being skipped.
            let window_end = filter.end_time.unwrap_or_else(Utc::now);
            match sync_orders(&self.db, &self.client, &filter).await {
                Ok(stats) => {
                    guard.add_records(stats.total_changes());
                    guard.complete_chunk();
                    result.completed_chunks += 1;
                    self.record_success(EntityType::Order, &stats, entity_started, window_end)
                        .await;
                    result.absorb(EntityType::Order, stats);
                }
                Err(err) => {
                    error!(error = %err, "Order sync failed");
                    guard.fail_chunk(format!("orders: {err}"));
                    result.absorb(EntityType::Order, EntityStats::failed(err.to_string()));
                }
            }
        }

        result.success = result.errors.is_empty();
        result.duration_seconds = started.elapsed().as_secs_f64();

        self.dispatcher
            .dispatch(&JobResult::new(guard.kind(), result.clone()))
            .await;
        result
    }

    async fn reconcile(&self, entity: EntityType) -> Result<EntityStats, crate::error::SyncError> {
        match entity {
            EntityType::Location => reconcile_entity::<LocationSync>(&self.db, &self.client).await,
            EntityType::Category => reconcile_entity::<CategorySync>(&self.db, &self.client).await,
            EntityType::Item => reconcile_entity::<ItemSync>(&self.db, &self.client).await,
            EntityType::Variation => {
                reconcile_entity::<VariationSync>(&self.db, &self.client).await
            }
            EntityType::InventoryRecord => {
                reconcile_entity::<InventorySync>(&self.db, &self.client).await
            }
            EntityType::Vendor => reconcile_entity::<VendorSync>(&self.db, &self.client).await,
            EntityType::Order => unreachable!("orders are synced outside the catalog pass"),
        }
    }

    /// Order fetch window: from the last successful order sync (or the
    /// configured earliest date) up to now. A full refresh ignores the
    /// watermark and re-fetches the whole history.
    async fn order_filter(&self, full_refresh: bool) -> Result<FetchFilter, crate::error::SyncError> {
        let begin = if full_refresh {
            self.earliest_window_start()
        } else {
            match self.state.get(EntityType::Order).await? {
                Some(row) => row.last_sync_at.with_timezone(&Utc),
                None => self.earliest_window_start(),
            }
        };
        Ok(FetchFilter::date_range(begin, Utc::now()))
    }

    fn earliest_window_start(&self) -> DateTime<Utc> {
        self.earliest_order_date
            .and_time(NaiveTime::MIN)
            .and_utc()
    }

    async fn record_success(
        &self,
        entity: EntityType,
        stats: &EntityStats,
        started: Instant,
        last_sync_at: DateTime<Utc>,
    ) {
        let outcome = self
            .state
            .record_run(
                entity,
                last_sync_at.into(),
                None,
                stats.fetched as i64,
                started.elapsed().as_millis() as i64,
            )
            .await;
        if let Err(err) = outcome {
            warn!(entity = %entity, error = %err, "Could not persist sync state");
        }
    }
}

fn aborted_stats() -> EntityStats {
    EntityStats {
        skipped: true,
        error: Some("skipped: run aborted after fatal error".to_string()),
        ..Default::default()
    }
}
