//! Category entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Catalog category, optionally nested under a parent category
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Upstream-assigned stable identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Category display name
    pub name: String,

    /// Parent category id for nested categories
    pub parent_category_id: Option<String>,

    /// Soft-delete flag
    pub is_deleted: bool,

    /// Timestamp of the last local write
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
