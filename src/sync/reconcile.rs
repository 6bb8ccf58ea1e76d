//! Generic full-set reconciliation.
//!
//! The upstream API does not guarantee a complete change feed for every
//! entity type, so each incremental run fetches the full current record set,
//! upserts by primary key, and soft-deletes local active rows that were
//! absent from the fetch. Re-running with no upstream change produces zero
//! additional writes.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::client::{FetchFilter, UpstreamClient};
use crate::error::SyncError;
use crate::sync::{ChangeKind, EntityStats, EntityType};

/// Reconciliation seam implemented once per catalog entity type.
///
/// Implementations map one upstream wire record onto the local table and
/// know how to soft-delete rows missing from the fetched set. All writes go
/// through the transaction owned by [`reconcile_entity`].
#[async_trait]
pub trait Reconcile {
    /// Entity type this implementation reconciles.
    const ENTITY: EntityType;

    /// Upstream wire record shape.
    type Upstream: DeserializeOwned + Send;

    /// Identity of the record within the fetched set. For most entities this
    /// is the upstream id; composite-identity entities join their key parts.
    fn upstream_id(record: &Self::Upstream) -> String;

    /// Insert or update the local row for this record, clearing the
    /// soft-delete flag if it was previously set.
    async fn upsert(
        txn: &DatabaseTransaction,
        record: Self::Upstream,
        now: DateTimeWithTimeZone,
    ) -> Result<ChangeKind, SyncError>;

    /// Soft-delete every local active row whose identity is not in `seen`.
    /// Returns the number of rows flagged.
    async fn soft_delete_absent(
        txn: &DatabaseTransaction,
        seen: &HashSet<String>,
        now: DateTimeWithTimeZone,
    ) -> Result<u64, SyncError>;
}

/// Reconcile one entity type's local table against its full upstream set.
///
/// All writes for the entity run in a single transaction; a failure rolls
/// the entity back without affecting previously synced entity types.
#[instrument(skip(db, client), fields(entity = %R::ENTITY))]
pub async fn reconcile_entity<R: Reconcile>(
    db: &DatabaseConnection,
    client: &UpstreamClient,
) -> Result<EntityStats, SyncError> {
    let raw_records = client
        .fetch_all(R::ENTITY.upstream_path(), &FetchFilter::default())
        .await?;

    let mut stats = EntityStats {
        fetched: raw_records.len() as u64,
        ..Default::default()
    };
    let now: DateTimeWithTimeZone = Utc::now().into();
    let mut seen = HashSet::with_capacity(raw_records.len());

    let txn = db.begin().await?;

    for raw in raw_records {
        let record: R::Upstream = serde_json::from_value(raw).map_err(|e| {
            SyncError::MalformedPayload(format!("{} record: {e}", R::ENTITY))
        })?;
        seen.insert(R::upstream_id(&record));
        let change = R::upsert(&txn, record, now)
            .await
            .map_err(SyncError::promote_schema_mismatch)?;
        stats.record(change);
    }

    let deleted = R::soft_delete_absent(&txn, &seen, now)
        .await
        .map_err(SyncError::promote_schema_mismatch)?;
    stats.deleted += deleted;

    txn.commit().await?;

    counter!("sync_records_written_total", "entity" => R::ENTITY.slug())
        .increment(stats.total_changes());
    if deleted > 0 {
        warn!(
            entity = %R::ENTITY,
            deleted,
            "Soft-deleted rows absent from upstream fetch"
        );
    }
    debug!(
        entity = %R::ENTITY,
        fetched = stats.fetched,
        created = stats.created,
        updated = stats.updated,
        deleted = stats.deleted,
        "Reconciled entity type"
    );

    Ok(stats)
}
