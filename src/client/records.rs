//! Upstream wire record types.
//!
//! Raw shapes returned by the upstream commerce API's list/search endpoints.
//! Fields the sync engine does not mirror locally are simply not declared;
//! serde ignores unknown keys.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Monetary amount in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamLocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_category_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamVariation {
    pub id: String,
    pub item_id: String,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price_money: Option<Money>,
}

/// Inventory counts carry no upstream id; identity is (variation, location).
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamInventoryCount {
    pub variation_id: String,
    pub location_id: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default = "default_inventory_state")]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamVendor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamOrder {
    pub id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default = "default_order_state")]
    pub state: String,
    #[serde(default)]
    pub total_money: Option<Money>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub line_items: Vec<UpstreamLineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamLineItem {
    pub uid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub variation_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: String,
    #[serde(default)]
    pub base_price_money: Option<Money>,
    #[serde(default)]
    pub total_money: Option<Money>,
}

fn default_status() -> String {
    "ACTIVE".to_string()
}

fn default_inventory_state() -> String {
    "IN_STOCK".to_string()
}

fn default_order_state() -> String {
    "OPEN".to_string()
}

fn default_quantity() -> String {
    "1".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_parses_with_embedded_line_items() {
        let raw = serde_json::json!({
            "id": "ord_1",
            "location_id": "loc_1",
            "state": "COMPLETED",
            "total_money": {"amount": 1250, "currency": "USD"},
            "created_at": "2023-04-01T10:30:00Z",
            "closed_at": "2023-04-01T10:45:00Z",
            "line_items": [
                {"uid": "li_1", "name": "Latte", "quantity": "2",
                 "base_price_money": {"amount": 450, "currency": "USD"},
                 "total_money": {"amount": 900, "currency": "USD"}}
            ],
            "some_future_field": true
        });

        let order: UpstreamOrder = serde_json::from_value(raw).unwrap();
        assert_eq!(order.state, "COMPLETED");
        assert_eq!(order.line_items.len(), 1);
        assert_eq!(order.line_items[0].quantity, "2");
        assert_eq!(order.total_money.as_ref().unwrap().amount, 1250);
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let raw = serde_json::json!({
            "id": "ord_2",
            "created_at": "2023-04-02T08:00:00Z"
        });
        let order: UpstreamOrder = serde_json::from_value(raw).unwrap();
        assert_eq!(order.state, "OPEN");
        assert!(order.line_items.is_empty());
        assert!(order.location_id.is_none());
    }
}
