//! Per-entity [`Reconcile`] implementations for the catalog tables.
//!
//! Each implementation maps one upstream record shape onto its local table.
//! Update detection is field-by-field so an unchanged upstream set produces
//! zero writes.

use std::collections::HashSet;

use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
};
use tracing::warn;

use crate::client::records::{
    UpstreamCategory, UpstreamInventoryCount, UpstreamItem, UpstreamLocation, UpstreamVariation,
    UpstreamVendor,
};
use crate::error::SyncError;
use crate::models::{category, inventory_record, item, location, variation, vendor};
use crate::sync::reconcile::Reconcile;
use crate::sync::{ChangeKind, EntityType};

pub struct LocationSync;

#[async_trait]
impl Reconcile for LocationSync {
    const ENTITY: EntityType = EntityType::Location;
    type Upstream = UpstreamLocation;

    fn upstream_id(record: &Self::Upstream) -> String {
        record.id.clone()
    }

    async fn upsert(
        txn: &DatabaseTransaction,
        record: Self::Upstream,
        now: DateTimeWithTimeZone,
    ) -> Result<ChangeKind, SyncError> {
        let existing = location::Entity::find_by_id(&record.id).one(txn).await?;

        match existing {
            None => {
                location::ActiveModel {
                    id: Set(record.id),
                    name: Set(record.name),
                    address: Set(record.address),
                    timezone: Set(record.timezone),
                    status: Set(record.status),
                    is_deleted: Set(false),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await?;
                Ok(ChangeKind::Created)
            }
            Some(current) => {
                let unchanged = current.name == record.name
                    && current.address == record.address
                    && current.timezone == record.timezone
                    && current.status == record.status
                    && !current.is_deleted;
                if unchanged {
                    return Ok(ChangeKind::Unchanged);
                }

                let mut active: location::ActiveModel = current.into();
                active.name = Set(record.name);
                active.address = Set(record.address);
                active.timezone = Set(record.timezone);
                active.status = Set(record.status);
                active.is_deleted = Set(false);
                active.updated_at = Set(now);
                active.update(txn).await?;
                Ok(ChangeKind::Updated)
            }
        }
    }

    async fn soft_delete_absent(
        txn: &DatabaseTransaction,
        seen: &HashSet<String>,
        now: DateTimeWithTimeZone,
    ) -> Result<u64, SyncError> {
        let result = location::Entity::update_many()
            .col_expr(location::Column::IsDeleted, Expr::value(true))
            .col_expr(location::Column::UpdatedAt, Expr::value(now))
            .filter(location::Column::IsDeleted.eq(false))
            .filter(location::Column::Id.is_not_in(seen.iter().cloned()))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}

pub struct CategorySync;

#[async_trait]
impl Reconcile for CategorySync {
    const ENTITY: EntityType = EntityType::Category;
    type Upstream = UpstreamCategory;

    fn upstream_id(record: &Self::Upstream) -> String {
        record.id.clone()
    }

    async fn upsert(
        txn: &DatabaseTransaction,
        record: Self::Upstream,
        now: DateTimeWithTimeZone,
    ) -> Result<ChangeKind, SyncError> {
        let existing = category::Entity::find_by_id(&record.id).one(txn).await?;

        match existing {
            None => {
                category::ActiveModel {
                    id: Set(record.id),
                    name: Set(record.name),
                    parent_category_id: Set(record.parent_category_id),
                    is_deleted: Set(false),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await?;
                Ok(ChangeKind::Created)
            }
            Some(current) => {
                let unchanged = current.name == record.name
                    && current.parent_category_id == record.parent_category_id
                    && !current.is_deleted;
                if unchanged {
                    return Ok(ChangeKind::Unchanged);
                }

                let mut active: category::ActiveModel = current.into();
                active.name = Set(record.name);
                active.parent_category_id = Set(record.parent_category_id);
                active.is_deleted = Set(false);
                active.updated_at = Set(now);
                active.update(txn).await?;
                Ok(ChangeKind::Updated)
            }
        }
    }

    async fn soft_delete_absent(
        txn: &DatabaseTransaction,
        seen: &HashSet<String>,
        now: DateTimeWithTimeZone,
    ) -> Result<u64, SyncError> {
        let result = category::Entity::update_many()
            .col_expr(category::Column::IsDeleted, Expr::value(true))
            .col_expr(category::Column::UpdatedAt, Expr::value(now))
            .filter(category::Column::IsDeleted.eq(false))
            .filter(category::Column::Id.is_not_in(seen.iter().cloned()))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}

pub struct ItemSync;

#[async_trait]
impl Reconcile for ItemSync {
    const ENTITY: EntityType = EntityType::Item;
    type Upstream = UpstreamItem;

    fn upstream_id(record: &Self::Upstream) -> String {
        record.id.clone()
    }

    async fn upsert(
        txn: &DatabaseTransaction,
        record: Self::Upstream,
        now: DateTimeWithTimeZone,
    ) -> Result<ChangeKind, SyncError> {
        let existing = item::Entity::find_by_id(&record.id).one(txn).await?;

        match existing {
            None => {
                item::ActiveModel {
                    id: Set(record.id),
                    name: Set(record.name),
                    description: Set(record.description),
                    category_id: Set(record.category_id),
                    is_deleted: Set(false),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await?;
                Ok(ChangeKind::Created)
            }
            Some(current) => {
                let unchanged = current.name == record.name
                    && current.description == record.description
                    && current.category_id == record.category_id
                    && !current.is_deleted;
                if unchanged {
                    return Ok(ChangeKind::Unchanged);
                }

                let mut active: item::ActiveModel = current.into();
                active.name = Set(record.name);
                active.description = Set(record.description);
                active.category_id = Set(record.category_id);
                active.is_deleted = Set(false);
                active.updated_at = Set(now);
                active.update(txn).await?;
                Ok(ChangeKind::Updated)
            }
        }
    }

    async fn soft_delete_absent(
        txn: &DatabaseTransaction,
        seen: &HashSet<String>,
        now: DateTimeWithTimeZone,
    ) -> Result<u64, SyncError> {
        let result = item::Entity::update_many()
            .col_expr(item::Column::IsDeleted, Expr::value(true))
            .col_expr(item::Column::UpdatedAt, Expr::value(now))
            .filter(item::Column::IsDeleted.eq(false))
            .filter(item::Column::Id.is_not_in(seen.iter().cloned()))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}

pub struct VariationSync;

#[async_trait]
impl Reconcile for VariationSync {
    const ENTITY: EntityType = EntityType::Variation;
    type Upstream = UpstreamVariation;

    fn upstream_id(record: &Self::Upstream) -> String {
        record.id.clone()
    }

    async fn upsert(
        txn: &DatabaseTransaction,
        record: Self::Upstream,
        now: DateTimeWithTimeZone,
    ) -> Result<ChangeKind, SyncError> {
        // A variation must never reference an item missing locally. The
        // coordinator's ordering makes this rare; an upstream record pointing
        // at an item filtered out of the catalog fetch is dropped here.
        let parent = item::Entity::find_by_id(&record.item_id).one(txn).await?;
        if parent.is_none() {
            warn!(
                variation_id = %record.id,
                item_id = %record.item_id,
                "Dropping variation referencing unknown item"
            );
            return Ok(ChangeKind::Unchanged);
        }

        let (price_amount, price_currency) = match &record.price_money {
            Some(money) => (Some(money.amount), Some(money.currency.clone())),
            None => (None, None),
        };

        let existing = variation::Entity::find_by_id(&record.id).one(txn).await?;

        match existing {
            None => {
                variation::ActiveModel {
                    id: Set(record.id),
                    item_id: Set(record.item_id),
                    name: Set(record.name),
                    sku: Set(record.sku),
                    price_amount: Set(price_amount),
                    price_currency: Set(price_currency),
                    is_deleted: Set(false),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await?;
                Ok(ChangeKind::Created)
            }
            Some(current) => {
                let unchanged = current.item_id == record.item_id
                    && current.name == record.name
                    && current.sku == record.sku
                    && current.price_amount == price_amount
                    && current.price_currency == price_currency
                    && !current.is_deleted;
                if unchanged {
                    return Ok(ChangeKind::Unchanged);
                }

                let mut active: variation::ActiveModel = current.into();
                active.item_id = Set(record.item_id);
                active.name = Set(record.name);
                active.sku = Set(record.sku);
                active.price_amount = Set(price_amount);
                active.price_currency = Set(price_currency);
                active.is_deleted = Set(false);
                active.updated_at = Set(now);
                active.update(txn).await?;
                Ok(ChangeKind::Updated)
            }
        }
    }

    async fn soft_delete_absent(
        txn: &DatabaseTransaction,
        seen: &HashSet<String>,
        now: DateTimeWithTimeZone,
    ) -> Result<u64, SyncError> {
        let result = variation::Entity::update_many()
            .col_expr(variation::Column::IsDeleted, Expr::value(true))
            .col_expr(variation::Column::UpdatedAt, Expr::value(now))
            .filter(variation::Column::IsDeleted.eq(false))
            .filter(variation::Column::Id.is_not_in(seen.iter().cloned()))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}

pub struct InventorySync;

/// Identity of an inventory count within a fetched set.
fn inventory_key(variation_id: &str, location_id: &str) -> String {
    format!("{variation_id}:{location_id}")
}

#[async_trait]
impl Reconcile for InventorySync {
    const ENTITY: EntityType = EntityType::InventoryRecord;
    type Upstream = UpstreamInventoryCount;

    fn upstream_id(record: &Self::Upstream) -> String {
        inventory_key(&record.variation_id, &record.location_id)
    }

    async fn upsert(
        txn: &DatabaseTransaction,
        record: Self::Upstream,
        now: DateTimeWithTimeZone,
    ) -> Result<ChangeKind, SyncError> {
        let variation_known = variation::Entity::find_by_id(&record.variation_id)
            .one(txn)
            .await?
            .is_some();
        let location_known = location::Entity::find_by_id(&record.location_id)
            .one(txn)
            .await?
            .is_some();
        if !variation_known || !location_known {
            warn!(
                variation_id = %record.variation_id,
                location_id = %record.location_id,
                "Dropping inventory count referencing unknown variation or location"
            );
            return Ok(ChangeKind::Unchanged);
        }

        let existing = inventory_record::Entity::find()
            .filter(inventory_record::Column::VariationId.eq(&record.variation_id))
            .filter(inventory_record::Column::LocationId.eq(&record.location_id))
            .one(txn)
            .await?;

        match existing {
            None => {
                inventory_record::ActiveModel {
                    variation_id: Set(record.variation_id),
                    location_id: Set(record.location_id),
                    quantity: Set(record.quantity),
                    state: Set(record.state),
                    is_deleted: Set(false),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;
                Ok(ChangeKind::Created)
            }
            Some(current) => {
                let unchanged = current.quantity == record.quantity
                    && current.state == record.state
                    && !current.is_deleted;
                if unchanged {
                    return Ok(ChangeKind::Unchanged);
                }

                let mut active: inventory_record::ActiveModel = current.into();
                active.quantity = Set(record.quantity);
                active.state = Set(record.state);
                active.is_deleted = Set(false);
                active.updated_at = Set(now);
                active.update(txn).await?;
                Ok(ChangeKind::Updated)
            }
        }
    }

    async fn soft_delete_absent(
        txn: &DatabaseTransaction,
        seen: &HashSet<String>,
        now: DateTimeWithTimeZone,
    ) -> Result<u64, SyncError> {
        // Composite identity, so absent rows are found in Rust rather than
        // with a NOT IN over a single column.
        let active_rows = inventory_record::Entity::find()
            .filter(inventory_record::Column::IsDeleted.eq(false))
            .all(txn)
            .await?;

        let mut deleted = 0;
        for row in active_rows {
            if seen.contains(&inventory_key(&row.variation_id, &row.location_id)) {
                continue;
            }
            let mut active: inventory_record::ActiveModel = row.into();
            active.is_deleted = Set(true);
            active.updated_at = Set(now);
            active.update(txn).await?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

pub struct VendorSync;

#[async_trait]
impl Reconcile for VendorSync {
    const ENTITY: EntityType = EntityType::Vendor;
    type Upstream = UpstreamVendor;

    fn upstream_id(record: &Self::Upstream) -> String {
        record.id.clone()
    }

    async fn upsert(
        txn: &DatabaseTransaction,
        record: Self::Upstream,
        now: DateTimeWithTimeZone,
    ) -> Result<ChangeKind, SyncError> {
        let existing = vendor::Entity::find_by_id(&record.id).one(txn).await?;

        match existing {
            None => {
                vendor::ActiveModel {
                    id: Set(record.id),
                    name: Set(record.name),
                    contact_email: Set(record.contact_email),
                    status: Set(record.status),
                    is_deleted: Set(false),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await?;
                Ok(ChangeKind::Created)
            }
            Some(current) => {
                let unchanged = current.name == record.name
                    && current.contact_email == record.contact_email
                    && current.status == record.status
                    && !current.is_deleted;
                if unchanged {
                    return Ok(ChangeKind::Unchanged);
                }

                let mut active: vendor::ActiveModel = current.into();
                active.name = Set(record.name);
                active.contact_email = Set(record.contact_email);
                active.status = Set(record.status);
                active.is_deleted = Set(false);
                active.updated_at = Set(now);
                active.update(txn).await?;
                Ok(ChangeKind::Updated)
            }
        }
    }

    async fn soft_delete_absent(
        txn: &DatabaseTransaction,
        seen: &HashSet<String>,
        now: DateTimeWithTimeZone,
    ) -> Result<u64, SyncError> {
        let result = vendor::Entity::update_many()
            .col_expr(vendor::Column::IsDeleted, Expr::value(true))
            .col_expr(vendor::Column::UpdatedAt, Expr::value(now))
            .filter(vendor::Column::IsDeleted.eq(false))
            .filter(vendor::Column::Id.is_not_in(seen.iter().cloned()))
            .exec(txn)
            .await?;
        Ok(result.rows_affected)
    }
}
