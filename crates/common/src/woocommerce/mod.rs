//! Store API abstraction
//!
//! Read-through access to a connected store's orders and products:
//! - `StoreApi` trait so reports can run against a fake in tests
//! - `WooCommerceClient` speaking the WooCommerce REST API (`wc/v3`)
//! - Exponential backoff on transport errors and 5xx responses

mod models;

pub use models::{
    ConnectionInfo, WooBilling, WooLineItem, WooOrder, WooOrderRefund, WooProduct,
};

use crate::config::StoreApiConfig;
use crate::db::models::Store;
use crate::dto::DateRange;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{header::HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Credentials needed to talk to one store
#[derive(Debug, Clone)]
pub struct StoreCredentials {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl From<&Store> for StoreCredentials {
    fn from(store: &Store) -> Self {
        Self {
            base_url: api_base(&store.url),
            consumer_key: store.consumer_key.clone(),
            consumer_secret: store.consumer_secret.clone(),
        }
    }
}

/// Stored URLs may omit the scheme; the API is always reached over https then
pub fn api_base(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Trait for reading data from a connected store
#[async_trait]
pub trait StoreApi: Send + Sync {
    /// Orders created within `range`, all statuses
    async fn orders(&self, store: &StoreCredentials, range: &DateRange) -> Result<Vec<WooOrder>>;

    /// Every product of the store
    async fn products(&self, store: &StoreCredentials) -> Result<Vec<WooProduct>>;

    /// Verify that the store answers with these credentials
    async fn test_connection(&self, store: &StoreCredentials) -> Result<ConnectionInfo>;
}

/// One decoded page plus the pagination headers
struct Page<T> {
    items: Vec<T>,
    total: u64,
    total_pages: u32,
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// WooCommerce REST client
pub struct WooCommerceClient {
    client: reqwest::Client,
    per_page: u32,
    max_pages: u32,
    retry_budget: Duration,
}

impl WooCommerceClient {
    /// Create a new client from configuration
    pub fn new(config: &StoreApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("shopboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            per_page: config.per_page.clamp(1, 100),
            max_pages: config.max_pages.max(1),
            retry_budget: Duration::from_secs(config.retry_budget_secs),
        })
    }

    /// Fetch one page, retrying transient failures
    async fn fetch_page<T: DeserializeOwned>(
        &self,
        store: &StoreCredentials,
        resource: &str,
        query: &[(&str, String)],
    ) -> Result<Page<T>> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_budget),
            ..ExponentialBackoff::default()
        };

        retry(policy, move || async move {
            let started = Instant::now();
            let outcome = self.request_page(store, resource, query).await;
            metrics::record_store_api(
                started.elapsed().as_secs_f64(),
                resource,
                outcome.is_ok(),
            );
            outcome.map_err(|err| {
                if is_transient(&err) {
                    warn!(resource, error = %err, "Store API request failed, retrying");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        })
        .await
    }

    async fn request_page<T: DeserializeOwned>(
        &self,
        store: &StoreCredentials,
        resource: &str,
        query: &[(&str, String)],
    ) -> Result<Page<T>> {
        let url = format!("{}/wp-json/wc/v3/{}", store.base_url, resource);

        let response = self
            .client
            .get(&url)
            .basic_auth(&store.consumer_key, Some(&store.consumer_secret))
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::StoreApi {
                message: format!("Request to {} failed: {}", store.base_url, e),
                status: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreApi {
                message: describe_failure(status, &body),
                status: Some(status.as_u16()),
            });
        }

        let total = header_number(response.headers(), "x-wp-total").unwrap_or(0);
        let total_pages = header_number(response.headers(), "x-wp-totalpages")
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(1);

        let items = response.json::<Vec<T>>().await.map_err(|e| AppError::StoreApi {
            message: format!("Unexpected response from {}: {}", store.base_url, e),
            status: Some(status.as_u16()),
        })?;

        Ok(Page {
            items,
            total,
            total_pages,
        })
    }

    /// Walk every page of a collection up to the configured bound
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        store: &StoreCredentials,
        resource: &str,
        filters: Vec<(&str, String)>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query = filters.clone();
            query.push(("per_page", self.per_page.to_string()));
            query.push(("page", page.to_string()));

            let fetched: Page<T> = self.fetch_page(store, resource, &query).await?;
            let empty = fetched.items.is_empty();
            items.extend(fetched.items);

            if empty || page >= fetched.total_pages {
                break;
            }
            if page >= self.max_pages {
                warn!(
                    resource,
                    fetched = items.len(),
                    total = fetched.total,
                    "Store API page limit reached, result truncated"
                );
                break;
            }
            page += 1;
        }

        debug!(resource, count = items.len(), "Store API collection fetched");
        Ok(items)
    }
}

/// 5xx, 429 and transport failures are worth retrying; other 4xx are not
fn is_transient(err: &AppError) -> bool {
    match err {
        AppError::StoreApi { status: None, .. } => true,
        AppError::StoreApi {
            status: Some(code), ..
        } => *code >= 500 || *code == StatusCode::TOO_MANY_REQUESTS.as_u16(),
        _ => false,
    }
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            "Store rejected the consumer key or secret".to_string()
        }
        StatusCode::NOT_FOUND => "Store API not found at this URL".to_string(),
        _ => {
            let snippet: String = body.chars().take(200).collect();
            format!("Store API returned {}: {}", status, snippet)
        }
    }
}

#[async_trait]
impl StoreApi for WooCommerceClient {
    async fn orders(&self, store: &StoreCredentials, range: &DateRange) -> Result<Vec<WooOrder>> {
        let filters = vec![
            ("status", "any".to_string()),
            ("dates_are_gmt", "true".to_string()),
            ("after", range.starts_at().format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("before", range.ends_before().format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("orderby", "date".to_string()),
            ("order", "desc".to_string()),
        ];
        self.fetch_all(store, "orders", filters).await
    }

    async fn products(&self, store: &StoreCredentials) -> Result<Vec<WooProduct>> {
        let filters = vec![("status", "publish".to_string())];
        self.fetch_all(store, "products", filters).await
    }

    async fn test_connection(&self, store: &StoreCredentials) -> Result<ConnectionInfo> {
        let started = Instant::now();
        let query = [("per_page", "1".to_string())];
        let page: Page<WooProduct> = self.request_page(store, "products", &query).await?;

        Ok(ConnectionInfo {
            reachable: true,
            product_count: page.total,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}
