//! # Sync Engine
//!
//! Dependency-ordered incremental reconciliation of catalog entities and
//! chunked historical backfill of order history, with progress tracking and
//! partial-failure isolation.

pub mod backfill;
pub mod catalog;
pub mod coordinator;
pub mod orders;
pub mod progress;
pub mod reconcile;
pub mod state;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The kinds of long-running jobs the engine can execute.
///
/// At most one job of each kind may run at a time; jobs of different kinds
/// may overlap and share the process-wide upstream request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    IncrementalSync,
    HistoricalBackfill,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::IncrementalSync => write!(f, "incremental sync"),
            JobKind::HistoricalBackfill => write!(f, "historical backfill"),
        }
    }
}

/// Entity types synchronized from the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Location,
    Category,
    Item,
    Variation,
    InventoryRecord,
    Vendor,
    Order,
}

impl EntityType {
    /// Fixed topological order for catalog reconciliation, reflecting the
    /// foreign-key graph. Orders are handled separately (upsert-only).
    pub const CATALOG_ORDER: [EntityType; 6] = [
        EntityType::Location,
        EntityType::Category,
        EntityType::Item,
        EntityType::Variation,
        EntityType::InventoryRecord,
        EntityType::Vendor,
    ];

    /// Stable slug used for sync_state rows, metrics labels, and stats keys.
    pub fn slug(&self) -> &'static str {
        match self {
            EntityType::Location => "locations",
            EntityType::Category => "categories",
            EntityType::Item => "items",
            EntityType::Variation => "variations",
            EntityType::InventoryRecord => "inventory_records",
            EntityType::Vendor => "vendors",
            EntityType::Order => "orders",
        }
    }

    /// Path of the upstream list endpoint for this entity type.
    pub fn upstream_path(&self) -> &'static str {
        match self {
            EntityType::Location => "locations",
            EntityType::Category => "catalog/categories",
            EntityType::Item => "catalog/items",
            EntityType::Variation => "catalog/variations",
            EntityType::InventoryRecord => "inventory/counts",
            EntityType::Vendor => "vendors",
            EntityType::Order => "orders",
        }
    }

    /// Entity types whose sync must have succeeded before this one runs.
    pub fn dependencies(&self) -> &'static [EntityType] {
        match self {
            EntityType::Location | EntityType::Category | EntityType::Vendor => &[],
            EntityType::Item => &[EntityType::Category],
            EntityType::Variation => &[EntityType::Item],
            EntityType::InventoryRecord => &[EntityType::Variation, EntityType::Location],
            EntityType::Order => &[EntityType::Location],
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Outcome of applying one upstream record to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    /// Local row already matched the upstream record; no write issued.
    Unchanged,
}

/// Per-entity-type statistics accumulated during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EntityStats {
    /// Records fetched from upstream
    pub fetched: u64,
    /// Rows inserted locally
    pub created: u64,
    /// Rows updated locally
    pub updated: u64,
    /// Rows soft-deleted because they were absent upstream
    pub deleted: u64,
    /// True when the entity was skipped because a dependency failed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    /// Error message when this entity's sync failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EntityStats {
    /// Tally one reconciliation outcome.
    pub fn record(&mut self, change: ChangeKind) {
        match change {
            ChangeKind::Created => self.created += 1,
            ChangeKind::Updated => self.updated += 1,
            ChangeKind::Deleted => self.deleted += 1,
            ChangeKind::Unchanged => {}
        }
    }

    /// Number of rows written during the run.
    pub fn total_changes(&self) -> u64 {
        self.created + self.updated + self.deleted
    }

    /// Mark this entity as skipped due to a failed dependency.
    pub fn skipped(dependency: EntityType) -> Self {
        Self {
            skipped: true,
            error: Some(format!("skipped: dependency {dependency} failed")),
            ..Default::default()
        }
    }

    /// Mark this entity as failed.
    pub fn failed(message: String) -> Self {
        Self {
            error: Some(message),
            ..Default::default()
        }
    }
}

/// Aggregate result of a coordinator run or backfill job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SyncRunResult {
    /// False when any entity type or chunk failed
    pub success: bool,
    /// Per-entity (or per-chunk grouping) statistics, keyed by slug
    pub per_entity: BTreeMap<String, EntityStats>,
    /// Units of work that finished successfully; failed units land in `errors`
    pub completed_chunks: u64,
    /// Total rows written across all entity types
    pub total_changes: u64,
    /// Errors accumulated during the run
    pub errors: Vec<String>,
    /// Wall-clock duration of the run in seconds
    pub duration_seconds: f64,
}

impl SyncRunResult {
    /// Fold one entity's stats into the aggregate.
    pub fn absorb(&mut self, entity: EntityType, stats: EntityStats) {
        self.total_changes += stats.total_changes();
        if let Some(error) = &stats.error {
            self.errors.push(format!("{entity}: {error}"));
        }
        self.per_entity.insert(entity.slug().to_string(), stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_order_respects_dependencies() {
        let order = EntityType::CATALOG_ORDER;
        for (idx, entity) in order.iter().enumerate() {
            for dep in entity.dependencies() {
                let dep_idx = order
                    .iter()
                    .position(|e| e == dep)
                    .expect("dependency present in catalog order");
                assert!(
                    dep_idx < idx,
                    "{dep} must be synced before {entity}"
                );
            }
        }
    }

    #[test]
    fn stats_tally_changes() {
        let mut stats = EntityStats::default();
        stats.record(ChangeKind::Created);
        stats.record(ChangeKind::Created);
        stats.record(ChangeKind::Updated);
        stats.record(ChangeKind::Unchanged);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.total_changes(), 3);
    }

    #[test]
    fn absorb_collects_errors() {
        let mut result = SyncRunResult::default();
        result.absorb(EntityType::Item, EntityStats::failed("boom".into()));
        result.absorb(EntityType::Variation, EntityStats::skipped(EntityType::Item));
        assert_eq!(result.errors.len(), 2);
        assert!(result.per_entity["variations"].skipped);
    }
}
