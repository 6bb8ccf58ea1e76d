//! Persistent per-entity sync bookkeeping.

use std::sync::Arc;

use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set, prelude::DateTimeWithTimeZone};

use crate::error::SyncError;
use crate::models::sync_state;
use crate::sync::EntityType;

/// Store for the `sync_state` table, one row per entity type.
///
/// Rows are written only after a successful sync of the entity type, so
/// `last_sync_at` doubles as the incremental watermark for orders.
#[derive(Clone)]
pub struct SyncStateStore {
    db: Arc<DatabaseConnection>,
}

impl SyncStateStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Bookkeeping row for one entity type, if it has ever synced.
    pub async fn get(&self, entity: EntityType) -> Result<Option<sync_state::Model>, SyncError> {
        let row = sync_state::Entity::find_by_id(entity.slug())
            .one(self.db.as_ref())
            .await?;
        Ok(row)
    }

    /// All bookkeeping rows, for the status endpoint and startup audit.
    pub async fn list_all(&self) -> Result<Vec<sync_state::Model>, SyncError> {
        let rows = sync_state::Entity::find().all(self.db.as_ref()).await?;
        Ok(rows)
    }

    /// Record a successful run for one entity type, replacing any prior row.
    pub async fn record_run(
        &self,
        entity: EntityType,
        last_sync_at: DateTimeWithTimeZone,
        last_cursor: Option<String>,
        records_synced: i64,
        duration_ms: i64,
    ) -> Result<(), SyncError> {
        let active = sync_state::ActiveModel {
            entity_type: Set(entity.slug().to_string()),
            last_sync_at: Set(last_sync_at),
            last_cursor: Set(last_cursor),
            records_synced: Set(records_synced),
            duration_ms: Set(duration_ms),
        };

        sync_state::Entity::insert(active)
            .on_conflict(
                OnConflict::column(sync_state::Column::EntityType)
                    .update_columns([
                        sync_state::Column::LastSyncAt,
                        sync_state::Column::LastCursor,
                        sync_state::Column::RecordsSynced,
                        sync_state::Column::DurationMs,
                    ])
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}
