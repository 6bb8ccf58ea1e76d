//! InventoryRecord entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

use super::location::Entity as Location;
use super::variation::Entity as Variation;

/// Inventory count for one variation at one location
///
/// `(variation_id, location_id)` is unique; upstream has no stable id for
/// inventory counts so the local row id is synthetic.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "inventory_records")]
pub struct Model {
    /// Synthetic local primary key
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Variation being counted
    pub variation_id: String,

    /// Location holding the stock
    pub location_id: String,

    /// Current on-hand quantity
    pub quantity: i64,

    /// Upstream inventory state (e.g. IN_STOCK, SOLD_OUT)
    pub state: String,

    /// Soft-delete flag
    pub is_deleted: bool,

    /// Timestamp of the last local write
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Variation",
        from = "Column::VariationId",
        to = "super::variation::Column::Id"
    )]
    Variation,
    #[sea_orm(
        belongs_to = "Location",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
}

impl Related<Variation> for Entity {
    fn to() -> RelationDef {
        Relation::Variation.def()
    }
}

impl Related<Location> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
