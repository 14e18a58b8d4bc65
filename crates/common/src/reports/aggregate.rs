//! Pure report computations over data fetched from connected stores
//!
//! Revenue only counts paid orders (completed or processing). Refund amounts
//! are taken from the refunds attached to orders in the window, whatever the
//! order's current status.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::constants::{OrderStatus, StockStatus};
use crate::db::models::Store;
use crate::dto::{DateRange, Pagination, SortOrder};
use crate::woocommerce::{WooOrder, WooProduct};

/// The parts of a store that reports need
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRef {
    pub id: Uuid,
    pub name: String,
    pub commission_rate: f64,
    pub shipping_cost: f64,
}

impl From<&Store> for StoreRef {
    fn from(store: &Store) -> Self {
        Self {
            id: store.id,
            name: store.name.clone(),
            commission_rate: store.commission_rate,
            shipping_cost: store.shipping_cost,
        }
    }
}

/// Orders fetched from one store
#[derive(Debug, Clone)]
pub struct StoreOrders {
    pub store: StoreRef,
    pub orders: Vec<WooOrder>,
}

/// Products fetched from one store
#[derive(Debug, Clone)]
pub struct StoreProducts {
    pub store: StoreRef,
    pub products: Vec<WooProduct>,
}

/// One page of rows plus the unpaged count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn paginate<T>(mut rows: Vec<T>, pagination: &Pagination) -> Paged<T> {
    let total = rows.len() as u64;
    let start = usize::try_from(pagination.offset())
        .unwrap_or(usize::MAX)
        .min(rows.len());
    let end = start
        .saturating_add(usize::try_from(pagination.limit).unwrap_or(usize::MAX))
        .min(rows.len());
    let items = rows.drain(start..end).collect();
    Paged { items, total }
}

fn in_range(range: &DateRange, at: NaiveDateTime) -> bool {
    let day = at.date();
    day >= range.start && day <= range.end
}

/// Orders of each store inside the window
fn windowed<'a>(
    data: &'a [StoreOrders],
    range: &'a DateRange,
) -> impl Iterator<Item = (&'a StoreRef, &'a WooOrder)> + 'a {
    data.iter().flat_map(move |entry| {
        entry
            .orders
            .iter()
            .filter(move |order| in_range(range, order.date_created_gmt))
            .map(move |order| (&entry.store, order))
    })
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub revenue: f64,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTotals {
    pub store_id: Uuid,
    pub store_name: String,
    pub revenue: f64,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub revenue: f64,
    pub orders: u64,
    pub paid_orders: u64,
    pub average_order_value: f64,
    pub refunds: f64,
    pub net_revenue: f64,
    pub status_breakdown: BTreeMap<String, u64>,
    pub daily: Vec<DailyPoint>,
    pub stores: Vec<StoreTotals>,
}

pub fn dashboard(data: &[StoreOrders], range: &DateRange) -> DashboardReport {
    let mut revenue = 0.0;
    let mut orders = 0u64;
    let mut paid_orders = 0u64;
    let mut refunds = 0.0;
    let mut status_breakdown = BTreeMap::new();
    let mut daily: BTreeMap<NaiveDate, (f64, u64)> = range
        .start
        .iter_days()
        .take_while(|day| *day <= range.end)
        .map(|day| (day, (0.0, 0)))
        .collect();
    let mut per_store: Vec<StoreTotals> = data
        .iter()
        .map(|entry| StoreTotals {
            store_id: entry.store.id,
            store_name: entry.store.name.clone(),
            revenue: 0.0,
            orders: 0,
        })
        .collect();

    for (index, entry) in data.iter().enumerate() {
        for order in entry
            .orders
            .iter()
            .filter(|order| in_range(range, order.date_created_gmt))
        {
            orders += 1;
            refunds += order.refunded_amount();
            *status_breakdown.entry(order.status.clone()).or_insert(0) += 1;

            if !order.is_paid() {
                continue;
            }
            paid_orders += 1;
            revenue += order.total;
            per_store[index].revenue += order.total;
            per_store[index].orders += 1;
            if let Some(point) = daily.get_mut(&order.date_created_gmt.date()) {
                point.0 += order.total;
                point.1 += 1;
            }
        }
    }

    for totals in &mut per_store {
        totals.revenue = round2(totals.revenue);
    }
    per_store.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));

    let average_order_value = if paid_orders > 0 {
        revenue / paid_orders as f64
    } else {
        0.0
    };

    DashboardReport {
        revenue: round2(revenue),
        orders,
        paid_orders,
        average_order_value: round2(average_order_value),
        refunds: round2(refunds),
        net_revenue: round2(revenue - refunds),
        status_breakdown,
        daily: daily
            .into_iter()
            .map(|(date, (revenue, orders))| DailyPoint {
                date,
                revenue: round2(revenue),
                orders,
            })
            .collect(),
        stores: per_store,
    }
}

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub store_id: Uuid,
    pub store_name: String,
    pub order_id: u64,
    pub number: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub customer: String,
    pub email: String,
    pub items: i64,
    pub total: f64,
    pub refunded: f64,
    pub currency: String,
}

pub fn orders(
    data: &[StoreOrders],
    range: &DateRange,
    status: Option<OrderStatus>,
    pagination: &Pagination,
) -> Paged<OrderRow> {
    let mut rows: Vec<OrderRow> = windowed(data, range)
        .filter(|(_, order)| status.map_or(true, |s| order.status == s.as_str()))
        .map(|(store, order)| OrderRow {
            store_id: store.id,
            store_name: store.name.clone(),
            order_id: order.id,
            number: order.number.clone(),
            status: order.status.clone(),
            created_at: order.date_created_gmt,
            customer: order.customer_name(),
            email: order.billing.email.clone(),
            items: order.item_count(),
            total: round2(order.total),
            refunded: round2(order.refunded_amount()),
            currency: order.currency.clone(),
        })
        .collect();

    rows.sort_by(|a, b| {
        let ordering = match pagination.sort_by.as_deref() {
            Some("total") => a.total.total_cmp(&b.total),
            Some("status") => a.status.cmp(&b.status),
            Some("customer") => a.customer.cmp(&b.customer),
            _ => a.created_at.cmp(&b.created_at),
        };
        directed(ordering, pagination.sort_order)
    });

    paginate(rows, pagination)
}

// ============================================================================
// Inventory
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    pub store_id: Uuid,
    pub store_name: String,
    pub product_id: u64,
    pub name: String,
    pub sku: String,
    pub price: f64,
    pub stock_quantity: Option<i64>,
    pub stock_status: Option<StockStatus>,
    pub total_sales: i64,
    pub stock_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub products: u64,
    pub in_stock: u64,
    pub out_of_stock: u64,
    pub on_backorder: u64,
    pub stock_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReport {
    pub summary: InventorySummary,
    pub products: Paged<ProductRow>,
}

pub fn inventory(data: &[StoreProducts], pagination: &Pagination) -> InventoryReport {
    let mut summary = InventorySummary::default();
    let mut rows = Vec::new();

    for entry in data {
        for product in &entry.products {
            let stock_status = product.stock();
            let stock_value = product.stock_quantity.unwrap_or(0).max(0) as f64 * product.price;

            summary.products += 1;
            summary.stock_value += stock_value;
            match stock_status {
                Some(StockStatus::InStock) => summary.in_stock += 1,
                Some(StockStatus::OutOfStock) => summary.out_of_stock += 1,
                Some(StockStatus::OnBackorder) => summary.on_backorder += 1,
                None => {}
            }

            rows.push(ProductRow {
                store_id: entry.store.id,
                store_name: entry.store.name.clone(),
                product_id: product.id,
                name: product.name.clone(),
                sku: product.sku.clone(),
                price: round2(product.price),
                stock_quantity: product.stock_quantity,
                stock_status,
                total_sales: product.total_sales,
                stock_value: round2(stock_value),
            });
        }
    }
    summary.stock_value = round2(summary.stock_value);

    match pagination.sort_by.as_deref() {
        Some("stockQuantity") => rows.sort_by(|a, b| {
            directed(a.stock_quantity.cmp(&b.stock_quantity), pagination.sort_order)
        }),
        Some("price") => {
            rows.sort_by(|a, b| directed(a.price.total_cmp(&b.price), pagination.sort_order))
        }
        Some("totalSales") => rows.sort_by(|a, b| {
            directed(a.total_sales.cmp(&b.total_sales), pagination.sort_order)
        }),
        Some("name") => rows.sort_by(|a, b| directed(a.name.cmp(&b.name), pagination.sort_order)),
        // Alphabetical unless asked otherwise
        _ => rows.sort_by(|a, b| a.name.cmp(&b.name)),
    }

    InventoryReport {
        summary,
        products: paginate(rows, pagination),
    }
}

// ============================================================================
// Payments
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodRow {
    pub method: String,
    pub title: String,
    pub orders: u64,
    pub amount: f64,
    /// Percent of paid revenue
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsReport {
    pub orders: u64,
    pub amount: f64,
    pub methods: Vec<PaymentMethodRow>,
}

pub fn payments(data: &[StoreOrders], range: &DateRange) -> PaymentsReport {
    let mut by_method: HashMap<String, PaymentMethodRow> = HashMap::new();
    let mut orders = 0u64;
    let mut amount = 0.0;

    for (_, order) in windowed(data, range).filter(|(_, order)| order.is_paid()) {
        orders += 1;
        amount += order.total;

        let method = if order.payment_method.is_empty() {
            "unknown".to_string()
        } else {
            order.payment_method.clone()
        };
        let row = by_method
            .entry(method.clone())
            .or_insert_with(|| PaymentMethodRow {
                method,
                title: order.payment_method_title.clone(),
                orders: 0,
                amount: 0.0,
                share: 0.0,
            });
        row.orders += 1;
        row.amount += order.total;
    }

    let mut methods: Vec<PaymentMethodRow> = by_method
        .into_values()
        .map(|mut row| {
            row.share = if amount > 0.0 {
                round2(row.amount / amount * 100.0)
            } else {
                0.0
            };
            row.amount = round2(row.amount);
            row
        })
        .collect();
    methods.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.method.cmp(&b.method))
    });

    PaymentsReport {
        orders,
        amount: round2(amount),
        methods,
    }
}

// ============================================================================
// Profits
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProfit {
    pub store_id: Uuid,
    pub store_name: String,
    pub orders: u64,
    pub revenue: f64,
    pub commission_rate: f64,
    pub commission: f64,
    pub shipping: f64,
    pub refunds: f64,
    pub net_profit: f64,
    /// Percent of revenue
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitsReport {
    pub revenue: f64,
    pub commission: f64,
    pub shipping: f64,
    pub refunds: f64,
    pub net_profit: f64,
    pub margin: f64,
    pub stores: Vec<StoreProfit>,
}

fn margin(net: f64, revenue: f64) -> f64 {
    if revenue > 0.0 {
        round2(net / revenue * 100.0)
    } else {
        0.0
    }
}

/// revenue - commission - shipping x paid orders - refunds, per store
pub fn profits(data: &[StoreOrders], range: &DateRange) -> ProfitsReport {
    let mut totals = (0.0, 0.0, 0.0, 0.0);

    let stores = data
        .iter()
        .map(|entry| {
            let mut orders = 0u64;
            let mut revenue = 0.0;
            let mut refunds = 0.0;
            for order in entry
                .orders
                .iter()
                .filter(|order| in_range(range, order.date_created_gmt))
            {
                refunds += order.refunded_amount();
                if order.is_paid() {
                    orders += 1;
                    revenue += order.total;
                }
            }

            let commission = revenue * entry.store.commission_rate / 100.0;
            let shipping = entry.store.shipping_cost * orders as f64;
            let net_profit = revenue - commission - shipping - refunds;

            totals.0 += revenue;
            totals.1 += commission;
            totals.2 += shipping;
            totals.3 += refunds;

            StoreProfit {
                store_id: entry.store.id,
                store_name: entry.store.name.clone(),
                orders,
                revenue: round2(revenue),
                commission_rate: entry.store.commission_rate,
                commission: round2(commission),
                shipping: round2(shipping),
                refunds: round2(refunds),
                net_profit: round2(net_profit),
                margin: margin(net_profit, revenue),
            }
        })
        .collect();

    let (revenue, commission, shipping, refunds) = totals;
    let net_profit = revenue - commission - shipping - refunds;

    ProfitsReport {
        revenue: round2(revenue),
        commission: round2(commission),
        shipping: round2(shipping),
        refunds: round2(refunds),
        net_profit: round2(net_profit),
        margin: margin(net_profit, revenue),
        stores,
    }
}

// ============================================================================
// Refunds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRow {
    pub store_id: Uuid,
    pub store_name: String,
    pub order_id: u64,
    pub order_number: String,
    pub refund_id: u64,
    pub reason: String,
    pub amount: f64,
    pub order_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundsReport {
    pub count: u64,
    pub amount: f64,
    pub refunded_orders: u64,
    pub refunds: Paged<RefundRow>,
}

pub fn refunds(data: &[StoreOrders], range: &DateRange, pagination: &Pagination) -> RefundsReport {
    let mut refunded_orders = 0u64;
    let mut amount = 0.0;
    let mut rows = Vec::new();

    for (store, order) in windowed(data, range) {
        if order.refunds.is_empty() {
            continue;
        }
        refunded_orders += 1;
        for refund in &order.refunds {
            amount += refund.amount();
            rows.push(RefundRow {
                store_id: store.id,
                store_name: store.name.clone(),
                order_id: order.id,
                order_number: order.number.clone(),
                refund_id: refund.id,
                reason: refund.reason.clone(),
                amount: round2(refund.amount()),
                order_date: order.date_created_gmt,
            });
        }
    }

    rows.sort_by(|a, b| {
        let ordering = match pagination.sort_by.as_deref() {
            Some("amount") => a.amount.total_cmp(&b.amount),
            _ => a.order_date.cmp(&b.order_date),
        };
        directed(ordering, pagination.sort_order)
    });

    RefundsReport {
        count: rows.len() as u64,
        amount: round2(amount),
        refunded_orders,
        refunds: paginate(rows, pagination),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::woocommerce::{WooBilling, WooOrderRefund};

    fn store(name: &str, commission_rate: f64, shipping_cost: f64) -> StoreRef {
        StoreRef {
            id: Uuid::new_v4(),
            name: name.into(),
            commission_rate,
            shipping_cost,
        }
    }

    fn order(id: u64, status: &str, day: u32, total: f64, refunds: &[f64]) -> WooOrder {
        WooOrder {
            id,
            number: id.to_string(),
            status: status.into(),
            currency: "USD".into(),
            date_created_gmt: NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            total,
            shipping_total: 0.0,
            payment_method: if id % 2 == 0 { "stripe" } else { "paypal" }.into(),
            payment_method_title: String::new(),
            billing: WooBilling::default(),
            line_items: Vec::new(),
            refunds: refunds
                .iter()
                .enumerate()
                .map(|(i, amount)| WooOrderRefund {
                    id: i as u64 + 1,
                    reason: String::new(),
                    total: -amount,
                })
                .collect(),
        }
    }

    fn march() -> DateRange {
        DateRange {
            start: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        }
    }

    fn sample() -> Vec<StoreOrders> {
        vec![StoreOrders {
            store: store("Main", 10.0, 2.0),
            orders: vec![
                order(1, "completed", 1, 100.0, &[]),
                order(2, "processing", 2, 50.0, &[10.0]),
                order(3, "pending", 3, 999.0, &[]),
                order(4, "refunded", 4, 30.0, &[30.0]),
            ],
        }]
    }

    #[test]
    fn test_profit_formula() {
        let report = profits(&sample(), &march());
        let main = &report.stores[0];

        // revenue 150, commission 15, shipping 2 x 2 orders, refunds 40
        assert_eq!(main.revenue, 150.0);
        assert_eq!(main.commission, 15.0);
        assert_eq!(main.shipping, 4.0);
        assert_eq!(main.refunds, 40.0);
        assert_eq!(main.net_profit, 91.0);
        assert_eq!(report.net_profit, 91.0);
        assert_eq!(main.margin, 60.67);
    }

    #[test]
    fn test_orders_outside_window_are_ignored() {
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
        };
        let report = dashboard(&sample(), &range);
        assert_eq!(report.orders, 2);
        assert_eq!(report.paid_orders, 1);
        assert_eq!(report.revenue, 50.0);
        assert_eq!(report.daily.len(), 2);
        assert_eq!(report.status_breakdown.get("pending"), Some(&1));
    }

    #[test]
    fn test_dashboard_totals() {
        let report = dashboard(&sample(), &march());
        assert_eq!(report.revenue, 150.0);
        assert_eq!(report.average_order_value, 75.0);
        assert_eq!(report.refunds, 40.0);
        assert_eq!(report.net_revenue, 110.0);
        assert_eq!(report.daily.len(), 31);
        assert_eq!(report.stores[0].orders, 2);
    }

    #[test]
    fn test_orders_filter_sort_and_page() {
        let pagination = Pagination {
            page: 1,
            limit: 2,
            sort_by: Some("total".into()),
            sort_order: SortOrder::Desc,
        };
        let page = orders(&sample(), &march(), None, &pagination);
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].order_id, 3);

        let completed = orders(
            &sample(),
            &march(),
            Some(OrderStatus::Completed),
            &Pagination::default(),
        );
        assert_eq!(completed.total, 1);
        assert_eq!(completed.items[0].order_id, 1);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let pagination = Pagination {
            page: 5,
            ..Pagination::default()
        };
        let page = orders(&sample(), &march(), None, &pagination);
        assert_eq!(page.total, 4);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_payments_group_paid_orders() {
        let report = payments(&sample(), &march());
        assert_eq!(report.orders, 2);
        assert_eq!(report.amount, 150.0);
        assert_eq!(report.methods[0].method, "paypal");
        assert_eq!(report.methods[0].share, 66.67);
    }

    #[test]
    fn test_refund_rows() {
        let report = refunds(&sample(), &march(), &Pagination::default());
        assert_eq!(report.count, 2);
        assert_eq!(report.refunded_orders, 2);
        assert_eq!(report.amount, 40.0);
        assert_eq!(report.refunds.items[0].order_id, 4);
    }

    #[test]
    fn test_inventory_summary() {
        let product = |id: u64, qty: Option<i64>, status: &str, price: f64| WooProduct {
            id,
            name: format!("P{}", id),
            sku: String::new(),
            price,
            manage_stock: qty.is_some(),
            stock_quantity: qty,
            stock_status: status.into(),
            total_sales: 0,
        };
        let data = vec![StoreProducts {
            store: store("Main", 0.0, 0.0),
            products: vec![
                product(1, Some(3), "instock", 10.0),
                product(2, Some(0), "outofstock", 5.0),
                product(3, None, "onbackorder", 7.0),
                product(4, Some(-2), "instock", 1.0),
            ],
        }];

        let report = inventory(&data, &Pagination::default());
        assert_eq!(report.summary.products, 4);
        assert_eq!(report.summary.in_stock, 2);
        assert_eq!(report.summary.out_of_stock, 1);
        assert_eq!(report.summary.on_backorder, 1);
        assert_eq!(report.summary.stock_value, 30.0);
        assert_eq!(report.products.items[0].name, "P1");
    }
}
