//! Order entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

use super::order_line_item::Entity as OrderLineItem;

/// Transactional order header
///
/// Orders are written by the historical backfill and by incremental order
/// sync. Once `state` reaches COMPLETED the row is effectively immutable,
/// though upserts still apply while the order is OPEN.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Upstream-assigned stable identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Location the order was placed at
    pub location_id: Option<String>,

    /// Order state (OPEN, COMPLETED, CANCELED)
    pub state: String,

    /// Order total in the smallest currency unit
    pub total_amount: Option<i64>,

    /// ISO 4217 currency code
    pub total_currency: Option<String>,

    /// Creation timestamp assigned by the upstream system
    pub created_at_upstream: DateTimeWithTimeZone,

    /// Timestamp the order was closed upstream
    pub closed_at: Option<DateTimeWithTimeZone>,

    /// Soft-delete flag
    pub is_deleted: bool,

    /// Timestamp of the last local write
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "OrderLineItem")]
    OrderLineItem,
}

impl Related<OrderLineItem> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLineItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
