//! # Data Models
//!
//! SeaORM entity models for the local mirror of the upstream commerce catalog
//! and order history, plus the sync_state bookkeeping table.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod category;
pub mod inventory_record;
pub mod item;
pub mod location;
pub mod order;
pub mod order_line_item;
pub mod sync_state;
pub mod variation;
pub mod vendor;

pub use category::Entity as Category;
pub use inventory_record::Entity as InventoryRecord;
pub use item::Entity as Item;
pub use location::Entity as Location;
pub use order::Entity as Order;
pub use order_line_item::Entity as OrderLineItem;
pub use sync_state::Entity as SyncState;
pub use variation::Entity as Variation;
pub use vendor::Entity as Vendor;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "merchsync".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
