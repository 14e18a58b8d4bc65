//! Wire types returned by the WooCommerce REST API (`wc/v3`)
//!
//! Money values arrive as decimal strings; counts sometimes as strings too.
//! Both are decoded leniently so a single odd field never fails a page.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{OrderStatus, StockStatus};

fn money<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WooBilling {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WooLineItem {
    #[serde(default)]
    pub product_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "count")]
    pub quantity: i64,
    #[serde(default, deserialize_with = "money")]
    pub total: f64,
}

/// Refund summary embedded in an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WooOrderRefund {
    pub id: u64,
    #[serde(default)]
    pub reason: String,
    /// Negative in the API
    #[serde(default, deserialize_with = "money")]
    pub total: f64,
}

impl WooOrderRefund {
    pub fn amount(&self) -> f64 {
        self.total.abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WooOrder {
    pub id: u64,
    #[serde(default)]
    pub number: String,
    pub status: String,
    #[serde(default)]
    pub currency: String,
    pub date_created_gmt: NaiveDateTime,
    #[serde(default, deserialize_with = "money")]
    pub total: f64,
    #[serde(default, deserialize_with = "money")]
    pub shipping_total: f64,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub payment_method_title: String,
    #[serde(default)]
    pub billing: WooBilling,
    #[serde(default)]
    pub line_items: Vec<WooLineItem>,
    #[serde(default)]
    pub refunds: Vec<WooOrderRefund>,
}

impl WooOrder {
    /// Known status, `None` for plugin-defined ones
    pub fn order_status(&self) -> Option<OrderStatus> {
        self.status.parse().ok()
    }

    pub fn is_paid(&self) -> bool {
        self.order_status().is_some_and(|s| s.is_paid())
    }

    pub fn refunded_amount(&self) -> f64 {
        self.refunds.iter().map(WooOrderRefund::amount).sum()
    }

    pub fn customer_name(&self) -> String {
        format!("{} {}", self.billing.first_name, self.billing.last_name)
            .trim()
            .to_string()
    }

    pub fn item_count(&self) -> i64 {
        self.line_items.iter().map(|item| item.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WooProduct {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default, deserialize_with = "money")]
    pub price: f64,
    #[serde(default)]
    pub manage_stock: bool,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    #[serde(default)]
    pub stock_status: String,
    #[serde(default, deserialize_with = "count")]
    pub total_sales: i64,
}

impl WooProduct {
    pub fn stock(&self) -> Option<StockStatus> {
        self.stock_status.parse().ok()
    }
}

/// Result of probing a store's credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub reachable: bool,
    pub product_count: u64,
    pub latency_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_decodes_string_money() {
        let order: WooOrder = serde_json::from_value(json!({
            "id": 42,
            "number": "42",
            "status": "completed",
            "currency": "EUR",
            "date_created_gmt": "2024-03-01T10:15:00",
            "total": "120.50",
            "shipping_total": "5.00",
            "payment_method": "stripe",
            "payment_method_title": "Card",
            "billing": { "first_name": "Ana", "last_name": "Ruiz", "email": "ana@x.co" },
            "line_items": [{ "product_id": 7, "name": "Mug", "quantity": 2, "total": "100.00" }],
            "refunds": [{ "id": 1, "reason": "broken", "total": "-20.00" }]
        }))
        .unwrap();

        assert_eq!(order.total, 120.5);
        assert!(order.is_paid());
        assert_eq!(order.refunded_amount(), 20.0);
        assert_eq!(order.customer_name(), "Ana Ruiz");
        assert_eq!(order.item_count(), 2);
    }

    #[test]
    fn test_unknown_status_is_not_paid() {
        let order: WooOrder = serde_json::from_value(json!({
            "id": 1,
            "status": "checkout-draft",
            "date_created_gmt": "2024-03-01T10:15:00",
            "total": "bogus"
        }))
        .unwrap();

        assert_eq!(order.order_status(), None);
        assert!(!order.is_paid());
        assert_eq!(order.total, 0.0);
    }

    #[test]
    fn test_product_stock_status() {
        let product: WooProduct = serde_json::from_value(json!({
            "id": 3,
            "name": "Tee",
            "price": "",
            "stock_quantity": null,
            "stock_status": "onbackorder",
            "total_sales": "12"
        }))
        .unwrap();

        assert_eq!(product.stock(), Some(StockStatus::OnBackorder));
        assert_eq!(product.total_sales, 12);
        assert_eq!(product.price, 0.0);
    }
}
