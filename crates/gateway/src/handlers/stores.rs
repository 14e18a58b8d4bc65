//! Connected store handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use shopboard_common::{
    auth::AuthContext,
    db::models::{Store, StoreStatus},
    dto::{CreateStoreRequest, PaginationQuery, UpdateStoreRequest},
    errors::{AppError, Result},
    metrics,
    validation::{ValidatedJson, ValidatedQuery},
    woocommerce::ConnectionInfo,
    ApiResponse, PageMeta,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::{authorize, ADMIN_ONLY, ANY_ROLE};
use crate::AppState;

/// Store as returned to clients; credentials never leave the server whole
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreView {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub status: StoreStatus,
    pub consumer_key: String,
    pub commission_rate: f64,
    pub shipping_cost: f64,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<&Store> for StoreView {
    fn from(store: &Store) -> Self {
        Self {
            id: store.id,
            name: store.name.clone(),
            url: store.url.clone(),
            status: store.status,
            consumer_key: mask_key(&store.consumer_key),
            commission_rate: store.commission_rate,
            shipping_cost: store.shipping_cost,
            created_at: store.created_at,
            updated_at: store.updated_at,
        }
    }
}

/// Keep the last four characters
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("****{}", tail)
}

async fn load_store(state: &AppState, tenant_id: Uuid, id: Uuid) -> Result<Store> {
    state
        .repo
        .find_store(tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("store", id))
}

/// Live stores of the company, paginated
pub async fn list_stores(
    State(state): State<AppState>,
    auth: AuthContext,
    ValidatedQuery(query): ValidatedQuery<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<StoreView>>>> {
    authorize(&state.repo, &auth, ANY_ROLE).await?;

    let pagination = query.resolve();
    let (stores, total) = state.repo.list_stores(auth.tenant_id, &pagination).await?;

    Ok(Json(ApiResponse::paginated(
        stores.iter().map(StoreView::from).collect(),
        PageMeta::new(total, pagination.page, pagination.limit),
    )))
}

/// One store
pub async fn get_store(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<StoreView>>> {
    authorize(&state.repo, &auth, ANY_ROLE).await?;
    let store = load_store(&state, auth.tenant_id, id).await?;
    Ok(Json(ApiResponse::ok(StoreView::from(&store))))
}

/// Connect a store, within the plan's store limit
pub async fn create_store(
    State(state): State<AppState>,
    auth: AuthContext,
    ValidatedJson(request): ValidatedJson<CreateStoreRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StoreView>>)> {
    authorize(&state.repo, &auth, ADMIN_ONLY).await?;

    let company = state
        .repo
        .find_company_by_id(auth.tenant_id)
        .await?
        .ok_or_else(|| AppError::not_found("company", auth.tenant_id))?;
    let quota = company.store_quota();

    let store = match state.repo.create_store(company.id, quota, &request).await {
        Ok(store) => store,
        Err(err @ AppError::QuotaExceeded { .. }) => {
            metrics::record_quota_rejection(quota.plan.as_str());
            warn!(
                tenant_id = %company.id,
                plan = %quota.plan,
                limit = quota.limit,
                "Store limit reached"
            );
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    state.reports.invalidate_tenant(company.id).await;

    info!(tenant_id = %company.id, store_id = %store.id, "Store connected");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(StoreView::from(&store))),
    ))
}

/// Partial store update
pub async fn update_store(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateStoreRequest>,
) -> Result<Json<ApiResponse<StoreView>>> {
    authorize(&state.repo, &auth, ADMIN_ONLY).await?;

    let store = load_store(&state, auth.tenant_id, id).await?;
    let store = state.repo.update_store(store, &request).await?;

    if request.touches_reports() {
        state.reports.invalidate_tenant(auth.tenant_id).await;
    }

    info!(tenant_id = %auth.tenant_id, store_id = %id, "Store updated");
    Ok(Json(ApiResponse::ok(StoreView::from(&store))))
}

/// Soft delete; the store stops counting against the plan
pub async fn delete_store(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    authorize(&state.repo, &auth, ADMIN_ONLY).await?;

    if !state.repo.soft_delete_store(auth.tenant_id, id).await? {
        return Err(AppError::not_found("store", id));
    }
    state.reports.invalidate_tenant(auth.tenant_id).await;

    info!(tenant_id = %auth.tenant_id, store_id = %id, "Store deleted");
    Ok(Json(ApiResponse::message("Store deleted")))
}

/// Check that the store answers with its saved credentials
pub async fn test_connection(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ConnectionInfo>>> {
    authorize(&state.repo, &auth, ADMIN_ONLY).await?;

    let store = load_store(&state, auth.tenant_id, id).await?;
    let info = state.reports.test_connection(&store).await?;

    info!(
        tenant_id = %auth.tenant_id,
        store_id = %id,
        latency_ms = info.latency_ms,
        "Store connection verified"
    );
    Ok(Json(ApiResponse::ok(info)))
}
