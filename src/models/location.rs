//! Location entity model
//!
//! Mirror of upstream business locations. Rows are soft-deleted when they
//! disappear from a full upstream fetch and resurrected when they reappear.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

/// Location entity representing a physical or virtual selling location
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "locations")]
pub struct Model {
    /// Upstream-assigned stable identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Display name of the location
    pub name: String,

    /// Postal address, if the upstream record carries one
    pub address: Option<String>,

    /// IANA timezone identifier
    pub timezone: Option<String>,

    /// Upstream status (e.g. ACTIVE, INACTIVE)
    pub status: String,

    /// Soft-delete flag; set when the row is absent from a full upstream fetch
    pub is_deleted: bool,

    /// Timestamp of the last local write
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
