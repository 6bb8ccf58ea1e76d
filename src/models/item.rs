//! Item entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

use super::category::Entity as Category;

/// Catalog item; the parent of one or more sellable variations
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "items")]
pub struct Model {
    /// Upstream-assigned stable identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Item display name
    pub name: String,

    /// Long-form description
    pub description: Option<String>,

    /// Owning category, synced before items in the dependency order
    pub category_id: Option<String>,

    /// Soft-delete flag
    pub is_deleted: bool,

    /// Timestamp of the last local write
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Category",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<Category> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
