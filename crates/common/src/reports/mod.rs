//! Store reports
//!
//! Each report namespace is computed from live store data and memoized in the
//! cache under `namespace:tenant:fingerprint`, where the fingerprint covers
//! every parameter that shapes the result.

pub mod aggregate;

pub use aggregate::{Paged, StoreOrders, StoreProducts, StoreRef};

use crate::cache::{keys, Cache};
use crate::constants::{CacheNamespace, OrderStatus};
use crate::db::models::Store;
use crate::dto::{DateRange, Pagination};
use crate::errors::{AppError, Result};
use crate::woocommerce::{ConnectionInfo, StoreApi, StoreCredentials};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Everything that shapes a report result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    pub store_ids: Vec<Uuid>,
    pub range: DateRange,
    pub status: Option<OrderStatus>,
    pub pagination: Pagination,
}

impl ReportParams {
    pub fn new(
        stores: &[Store],
        range: DateRange,
        status: Option<OrderStatus>,
        pagination: Pagination,
    ) -> Self {
        let mut store_ids: Vec<Uuid> = stores.iter().map(|s| s.id).collect();
        store_ids.sort();
        Self {
            store_ids,
            range,
            status,
            pagination,
        }
    }
}

/// A computed report as cached: the payload plus the row count for paged ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOutput {
    pub data: serde_json::Value,
    pub total: Option<u64>,
}

impl ReportOutput {
    fn whole<T: Serialize>(report: &T) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_value(report)?,
            total: None,
        })
    }

    fn paged<T: Serialize>(report: &T, total: u64) -> Result<Self> {
        Ok(Self {
            data: serde_json::to_value(report)?,
            total: Some(total),
        })
    }
}

/// Computes and caches reports for a tenant's stores
#[derive(Clone)]
pub struct ReportService {
    api: Arc<dyn StoreApi>,
    cache: Cache,
}

impl ReportService {
    pub fn new(api: Arc<dyn StoreApi>, cache: Cache) -> Self {
        Self { api, cache }
    }

    /// Cached report for `stores`, computing it on a miss
    pub async fn report(
        &self,
        namespace: CacheNamespace,
        tenant_id: Uuid,
        stores: &[Store],
        params: &ReportParams,
    ) -> Result<ReportOutput> {
        let key = keys::report(namespace, tenant_id, &keys::fingerprint(params));

        self.cache
            .get_or_compute(&key, self.cache.default_ttl(), namespace.as_str(), || {
                self.compute(namespace, tenant_id, stores, params)
            })
            .await
    }

    async fn compute(
        &self,
        namespace: CacheNamespace,
        tenant_id: Uuid,
        stores: &[Store],
        params: &ReportParams,
    ) -> Result<ReportOutput> {
        let started = Instant::now();
        let range = &params.range;
        let pagination = &params.pagination;

        let output = match namespace {
            CacheNamespace::Inventory => {
                let data = self.load_products(stores).await?;
                let report = aggregate::inventory(&data, pagination);
                ReportOutput::paged(&report, report.products.total)?
            }
            CacheNamespace::Dashboard => {
                let data = self.load_orders(stores, range).await?;
                ReportOutput::whole(&aggregate::dashboard(&data, range))?
            }
            CacheNamespace::Orders => {
                let data = self.load_orders(stores, range).await?;
                let page = aggregate::orders(&data, range, params.status, pagination);
                ReportOutput::paged(&page.items, page.total)?
            }
            CacheNamespace::Payments => {
                let data = self.load_orders(stores, range).await?;
                ReportOutput::whole(&aggregate::payments(&data, range))?
            }
            CacheNamespace::Profits => {
                let data = self.load_orders(stores, range).await?;
                ReportOutput::whole(&aggregate::profits(&data, range))?
            }
            CacheNamespace::Refunds => {
                let data = self.load_orders(stores, range).await?;
                let report = aggregate::refunds(&data, range, pagination);
                ReportOutput::paged(&report, report.refunds.total)?
            }
        };

        info!(
            tenant_id = %tenant_id,
            namespace = %namespace,
            stores = stores.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Report computed"
        );
        Ok(output)
    }

    async fn load_orders(&self, stores: &[Store], range: &DateRange) -> Result<Vec<StoreOrders>> {
        try_join_all(stores.iter().map(|store| async move {
            let orders = self
                .api
                .orders(&StoreCredentials::from(store), range)
                .await?;
            Ok::<_, AppError>(StoreOrders {
                store: StoreRef::from(store),
                orders,
            })
        }))
        .await
    }

    async fn load_products(&self, stores: &[Store]) -> Result<Vec<StoreProducts>> {
        try_join_all(stores.iter().map(|store| async move {
            let products = self.api.products(&StoreCredentials::from(store)).await?;
            Ok::<_, AppError>(StoreProducts {
                store: StoreRef::from(store),
                products,
            })
        }))
        .await
    }

    /// Drop every cached report of a tenant
    pub async fn invalidate_tenant(&self, tenant_id: Uuid) -> u64 {
        let mut removed = 0;
        for namespace in CacheNamespace::ALL {
            removed += self
                .cache
                .invalidate_prefix(&keys::tenant_prefix(namespace, tenant_id))
                .await;
        }
        info!(tenant_id = %tenant_id, removed, "Tenant reports invalidated");
        removed
    }

    /// Probe a store's credentials without caching
    pub async fn test_connection(&self, store: &Store) -> Result<ConnectionInfo> {
        self.api.test_connection(&StoreCredentials::from(store)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::StoreStatus;
    use crate::woocommerce::{WooBilling, WooOrder, WooProduct};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Store API double that counts calls
    #[derive(Default)]
    struct FakeStoreApi {
        order_calls: AtomicUsize,
        product_calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl StoreApi for FakeStoreApi {
        async fn orders(&self, _store: &StoreCredentials, _range: &DateRange) -> Result<Vec<WooOrder>> {
            self.order_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::StoreApi {
                    message: "down".into(),
                    status: Some(503),
                });
            }
            Ok(vec![WooOrder {
                id: 1,
                number: "1".into(),
                status: "completed".into(),
                currency: "USD".into(),
                date_created_gmt: NaiveDate::from_ymd_opt(2024, 3, 10)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap(),
                total: 80.0,
                shipping_total: 0.0,
                payment_method: "stripe".into(),
                payment_method_title: "Card".into(),
                billing: WooBilling::default(),
                line_items: Vec::new(),
                refunds: Vec::new(),
            }])
        }

        async fn products(&self, _store: &StoreCredentials) -> Result<Vec<WooProduct>> {
            self.product_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn test_connection(&self, _store: &StoreCredentials) -> Result<ConnectionInfo> {
            Ok(ConnectionInfo {
                reachable: true,
                product_count: 0,
                latency_ms: 1,
            })
        }
    }

    fn store(company_id: Uuid) -> Store {
        let now = chrono::Utc::now().into();
        Store {
            id: Uuid::new_v4(),
            company_id,
            name: "Main".into(),
            url: "shop.test".into(),
            consumer_key: "ck_".repeat(11),
            consumer_secret: "cs_".repeat(11),
            status: StoreStatus::Active,
            commission_rate: 10.0,
            shipping_cost: 1.0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn params(stores: &[Store]) -> ReportParams {
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        };
        ReportParams::new(stores, range, None, Pagination::default())
    }

    fn service(api: Arc<FakeStoreApi>) -> ReportService {
        ReportService::new(api, Cache::in_memory(Duration::from_secs(300)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_read_within_ttl_is_cached() {
        let api = Arc::new(FakeStoreApi::default());
        let reports = service(api.clone());
        let tenant = Uuid::new_v4();
        let stores = vec![store(tenant)];
        let params = params(&stores);

        let first = reports
            .report(CacheNamespace::Profits, tenant, &stores, &params)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = reports
            .report(CacheNamespace::Profits, tenant, &stores, &params)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(api.order_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        reports
            .report(CacheNamespace::Profits, tenant, &stores, &params)
            .await
            .unwrap();
        assert_eq!(api.order_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tenants_do_not_share_entries() {
        let api = Arc::new(FakeStoreApi::default());
        let reports = service(api.clone());
        let stores = vec![store(Uuid::new_v4())];
        let params = params(&stores);

        for tenant in [Uuid::new_v4(), Uuid::new_v4()] {
            reports
                .report(CacheNamespace::Payments, tenant, &stores, &params)
                .await
                .unwrap();
        }
        assert_eq!(api.order_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_tenant_forces_recompute() {
        let api = Arc::new(FakeStoreApi::default());
        let reports = service(api.clone());
        let tenant = Uuid::new_v4();
        let stores = vec![store(tenant)];
        let params = params(&stores);

        reports
            .report(CacheNamespace::Orders, tenant, &stores, &params)
            .await
            .unwrap();
        assert!(reports.invalidate_tenant(tenant).await >= 1);
        let output = reports
            .report(CacheNamespace::Orders, tenant, &stores, &params)
            .await
            .unwrap();

        assert_eq!(api.order_calls.load(Ordering::SeqCst), 2);
        assert_eq!(output.total, Some(1));
    }

    #[tokio::test]
    async fn test_inventory_reads_products_only() {
        let api = Arc::new(FakeStoreApi::default());
        let reports = service(api.clone());
        let tenant = Uuid::new_v4();
        let stores = vec![store(tenant), store(tenant)];

        let output = reports
            .report(CacheNamespace::Inventory, tenant, &stores, &params(&stores))
            .await
            .unwrap();

        assert_eq!(api.product_calls.load(Ordering::SeqCst), 2);
        assert_eq!(api.order_calls.load(Ordering::SeqCst), 0);
        assert_eq!(output.total, Some(0));
    }

    #[tokio::test]
    async fn test_store_api_failure_is_not_cached() {
        let api = Arc::new(FakeStoreApi {
            fail: true,
            ..FakeStoreApi::default()
        });
        let reports = service(api.clone());
        let tenant = Uuid::new_v4();
        let stores = vec![store(tenant)];
        let params = params(&stores);

        for _ in 0..2 {
            let err = reports
                .report(CacheNamespace::Dashboard, tenant, &stores, &params)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::StoreApi { .. }));
        }
        assert_eq!(api.order_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_stores_means_no_calls() {
        let api = Arc::new(FakeStoreApi::default());
        let reports = service(api.clone());
        let output = reports
            .report(CacheNamespace::Profits, Uuid::new_v4(), &[], &params(&[]))
            .await
            .unwrap();

        assert_eq!(api.order_calls.load(Ordering::SeqCst), 0);
        assert_eq!(output.data["revenue"], 0.0);
    }
}
