//! SyncState entity model
//!
//! One row per entity type recording the outcome of the most recent
//! successful incremental sync run.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Per-entity-type sync bookkeeping row
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_state")]
pub struct Model {
    /// Entity type slug (primary key), e.g. "locations"
    #[sea_orm(primary_key, auto_increment = false)]
    pub entity_type: String,

    /// Timestamp of the last successful sync for this entity type
    pub last_sync_at: DateTimeWithTimeZone,

    /// Last pagination cursor observed, for audit purposes
    pub last_cursor: Option<String>,

    /// Number of upstream records processed in the last run
    pub records_synced: i64,

    /// Wall-clock duration of the last run in milliseconds
    pub duration_ms: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
