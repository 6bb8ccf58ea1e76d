//! OrderLineItem entity model
//!
//! Line items have no independent global identity upstream; they are keyed by
//! the composite `(order_id, line_uid)` pair.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

use super::order::Entity as Order;

/// One line of an order
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "order_line_items")]
pub struct Model {
    /// Owning order id (first half of the composite primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: String,

    /// Line identifier unique within the order (second half of the key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub line_uid: String,

    /// Item name as it appeared on the order
    pub item_name: Option<String>,

    /// Variation sold, when the upstream record links one
    pub variation_id: Option<String>,

    /// Quantity as an upstream decimal string
    pub quantity: String,

    /// Unit price in the smallest currency unit
    pub base_price_amount: Option<i64>,

    /// Line total in the smallest currency unit
    pub total_amount: Option<i64>,

    /// Set when the line dropped out of the upstream order payload
    pub is_deleted: bool,

    /// Timestamp of the last local write
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Order",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<Order> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
