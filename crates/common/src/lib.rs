//! ShopBoard Common Library
//!
//! Shared code for the ShopBoard services including:
//! - Request contracts, validation and localized messages
//! - Database models and repository patterns
//! - Report cache over Redis
//! - Store API client and report computations
//! - Error types and the response envelope
//! - Configuration management
//! - Authentication utilities and plan quotas
//! - Metrics and observability

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod constants;
pub mod db;
pub mod dto;
pub mod errors;
pub mod metrics;
pub mod plan;
pub mod reports;
pub mod validation;
pub mod woocommerce;

// Re-export commonly used types
pub use api::{ApiResponse, PageMeta};
pub use cache::Cache;
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use reports::ReportService;
pub use woocommerce::StoreApi;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
