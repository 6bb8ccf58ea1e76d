//! Variation entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

use super::item::Entity as Item;

/// Sellable variation of an item (size, color, etc.)
///
/// A variation row is never written unless its parent item already exists
/// locally; the dependency coordinator enforces this ordering.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "variations")]
pub struct Model {
    /// Upstream-assigned stable identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Parent item id
    pub item_id: String,

    /// Variation display name
    pub name: String,

    /// Stock keeping unit
    pub sku: Option<String>,

    /// Price in the smallest currency unit
    pub price_amount: Option<i64>,

    /// ISO 4217 currency code
    pub price_currency: Option<String>,

    /// Soft-delete flag
    pub is_deleted: bool,

    /// Timestamp of the last local write
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Item",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
}

impl Related<Item> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
