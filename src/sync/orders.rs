//! Order upserts shared by incremental sync and historical backfill.
//!
//! Orders are never soft-deleted by absence: any fetch covers only a date
//! window, so a missing order means nothing. Line items arrive embedded in
//! the order payload and are reconciled as a set per order; a line that
//! drops out of the payload is flagged deleted, never removed, so past
//! reporting keeps its rows.

use chrono::Utc;
use metrics::counter;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use tracing::{debug, instrument};

use crate::client::records::UpstreamOrder;
use crate::client::{FetchFilter, UpstreamClient};
use crate::error::SyncError;
use crate::models::{order, order_line_item};
use crate::sync::{ChangeKind, EntityStats, EntityType};

/// Insert or update one order together with its line items.
///
/// Line items present locally but absent from the payload are soft-deleted;
/// the upstream payload is authoritative for the full line set of an order.
pub async fn upsert_order_tree(
    txn: &DatabaseTransaction,
    record: UpstreamOrder,
    now: DateTimeWithTimeZone,
) -> Result<ChangeKind, SyncError> {
    let (total_amount, total_currency) = match &record.total_money {
        Some(money) => (Some(money.amount), Some(money.currency.clone())),
        None => (None, None),
    };
    let created_at_upstream: DateTimeWithTimeZone = record.created_at.into();
    let closed_at: Option<DateTimeWithTimeZone> = record.closed_at.map(Into::into);

    let existing = order::Entity::find_by_id(&record.id).one(txn).await?;
    let order_id = record.id.clone();

    let mut header_change = match existing {
        None => {
            order::ActiveModel {
                id: Set(record.id),
                location_id: Set(record.location_id),
                state: Set(record.state),
                total_amount: Set(total_amount),
                total_currency: Set(total_currency),
                created_at_upstream: Set(created_at_upstream),
                closed_at: Set(closed_at),
                is_deleted: Set(false),
                updated_at: Set(now),
            }
            .insert(txn)
            .await?;
            ChangeKind::Created
        }
        Some(current) => {
            let unchanged = current.location_id == record.location_id
                && current.state == record.state
                && current.total_amount == total_amount
                && current.total_currency == total_currency
                && current.closed_at == closed_at
                && !current.is_deleted;
            if unchanged {
                ChangeKind::Unchanged
            } else {
                let mut active: order::ActiveModel = current.into();
                active.location_id = Set(record.location_id);
                active.state = Set(record.state);
                active.total_amount = Set(total_amount);
                active.total_currency = Set(total_currency);
                active.closed_at = Set(closed_at);
                active.is_deleted = Set(false);
                active.updated_at = Set(now);
                active.update(txn).await?;
                ChangeKind::Updated
            }
        }
    };

    let existing_lines = order_line_item::Entity::find()
        .filter(order_line_item::Column::OrderId.eq(&order_id))
        .all(txn)
        .await?;

    let mut lines_changed = false;
    let incoming_uids: Vec<String> = record.line_items.iter().map(|l| l.uid.clone()).collect();

    for line in record.line_items {
        let (base_price_amount, total_amount) = (
            line.base_price_money.as_ref().map(|m| m.amount),
            line.total_money.as_ref().map(|m| m.amount),
        );

        match existing_lines.iter().find(|l| l.line_uid == line.uid) {
            None => {
                order_line_item::ActiveModel {
                    order_id: Set(order_id.clone()),
                    line_uid: Set(line.uid),
                    item_name: Set(line.name),
                    variation_id: Set(line.variation_id),
                    quantity: Set(line.quantity),
                    base_price_amount: Set(base_price_amount),
                    total_amount: Set(total_amount),
                    is_deleted: Set(false),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await?;
                lines_changed = true;
            }
            Some(current) => {
                let unchanged = current.item_name == line.name
                    && current.variation_id == line.variation_id
                    && current.quantity == line.quantity
                    && current.base_price_amount == base_price_amount
                    && current.total_amount == total_amount
                    && !current.is_deleted;
                if unchanged {
                    continue;
                }
                let mut active: order_line_item::ActiveModel = current.clone().into();
                active.item_name = Set(line.name);
                active.variation_id = Set(line.variation_id);
                active.quantity = Set(line.quantity);
                active.base_price_amount = Set(base_price_amount);
                active.total_amount = Set(total_amount);
                active.is_deleted = Set(false);
                active.updated_at = Set(now);
                active.update(txn).await?;
                lines_changed = true;
            }
        }
    }

    for stale in existing_lines
        .into_iter()
        .filter(|l| !l.is_deleted && !incoming_uids.contains(&l.line_uid))
    {
        let mut active: order_line_item::ActiveModel = stale.into();
        active.is_deleted = Set(true);
        active.updated_at = Set(now);
        active.update(txn).await?;
        lines_changed = true;
    }

    if lines_changed && header_change == ChangeKind::Unchanged {
        header_change = ChangeKind::Updated;
    }
    Ok(header_change)
}

/// Fetch and upsert all orders matching the filter in a single transaction.
///
/// Used by the incremental sync pass with a watermark-based begin time; the
/// backfill job manages its own pagination and batching instead.
#[instrument(skip(db, client))]
pub async fn sync_orders(
    db: &DatabaseConnection,
    client: &UpstreamClient,
    filter: &FetchFilter,
) -> Result<EntityStats, SyncError> {
    let raw_records = client
        .fetch_all(EntityType::Order.upstream_path(), filter)
        .await?;

    let mut stats = EntityStats {
        fetched: raw_records.len() as u64,
        ..Default::default()
    };
    let now: DateTimeWithTimeZone = Utc::now().into();
    let txn = db.begin().await?;

    for raw in raw_records {
        let record: UpstreamOrder = serde_json::from_value(raw)
            .map_err(|e| SyncError::MalformedPayload(format!("order record: {e}")))?;
        let change = upsert_order_tree(&txn, record, now)
            .await
            .map_err(SyncError::promote_schema_mismatch)?;
        stats.record(change);
    }

    txn.commit().await?;

    counter!("sync_records_written_total", "entity" => EntityType::Order.slug())
        .increment(stats.total_changes());
    debug!(
        fetched = stats.fetched,
        created = stats.created,
        updated = stats.updated,
        "Synced order window"
    );

    Ok(stats)
}
