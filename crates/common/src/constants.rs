//! Static enumerations and defaults shared across the service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Largest page a client may request
pub const MAX_PAGE_SIZE: u64 = 100;

/// Highest page number a client may request
pub const MAX_PAGE: u64 = 10_000;

/// Longest custom report window, in days
pub const MAX_REPORT_SPAN_DAYS: u64 = 731;

/// Default lifetime of a cached report
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Lifetime of a password reset token
pub const PASSWORD_RESET_TTL: Duration = Duration::from_secs(60 * 60);

/// Lifetime of a member invitation
pub const INVITATION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Order status as reported by the store API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Completed,
    Processing,
    Pending,
    OnHold,
    Cancelled,
    Refunded,
    Failed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Completed,
        OrderStatus::Processing,
        OrderStatus::Pending,
        OrderStatus::OnHold,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
        OrderStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Completed => "completed",
            OrderStatus::Processing => "processing",
            OrderStatus::Pending => "pending",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
        }
    }

    /// Orders that count towards revenue
    pub fn is_paid(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Processing)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {}", s))
    }
}

/// Product stock status as reported by the store API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    OnBackorder,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "instock",
            StockStatus::OutOfStock => "outofstock",
            StockStatus::OnBackorder => "onbackorder",
        }
    }
}

impl FromStr for StockStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instock" => Ok(StockStatus::InStock),
            "outofstock" => Ok(StockStatus::OutOfStock),
            "onbackorder" => Ok(StockStatus::OnBackorder),
            other => Err(format!("unknown stock status: {}", other)),
        }
    }
}

/// Report resource, one cache namespace each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheNamespace {
    Dashboard,
    Inventory,
    Orders,
    Payments,
    Profits,
    Refunds,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 6] = [
        CacheNamespace::Dashboard,
        CacheNamespace::Inventory,
        CacheNamespace::Orders,
        CacheNamespace::Payments,
        CacheNamespace::Profits,
        CacheNamespace::Refunds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Dashboard => "dashboard",
            CacheNamespace::Inventory => "inventory",
            CacheNamespace::Orders => "orders",
            CacheNamespace::Payments => "payments",
            CacheNamespace::Profits => "profits",
            CacheNamespace::Refunds => "refunds",
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheNamespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheNamespace::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| format!("unknown report: {}", s))
    }
}
