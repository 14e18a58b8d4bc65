//! Report handlers

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use shopboard_common::{
    auth::{AuthContext, Role},
    constants::CacheNamespace,
    dto::ReportQuery,
    errors::{AppError, Result},
    reports::ReportParams,
    validation::{Locale, ValidatedQuery},
    ApiResponse, PageMeta,
};
use tracing::debug;

use super::{authorize, ANY_ROLE};
use crate::AppState;

fn parse_namespace(name: &str) -> Result<CacheNamespace> {
    name.parse()
        .map_err(|_| AppError::not_found("report", name))
}

fn ensure_visible(role: Role, namespace: CacheNamespace) -> Result<()> {
    if role.can_view(namespace) {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            message: format!("Role {} cannot view the {} report", role, namespace),
        })
    }
}

/// One report over the company's active stores, served from cache when fresh
pub async fn get_report(
    State(state): State<AppState>,
    auth: AuthContext,
    locale: Locale,
    Path(namespace): Path<String>,
    ValidatedQuery(query): ValidatedQuery<ReportQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    let namespace = parse_namespace(&namespace)?;

    let member = authorize(&state.repo, &auth, ANY_ROLE).await?;
    ensure_visible(member.role, namespace)?;

    let range = query.date_range(Utc::now().date_naive(), locale)?;
    let pagination = query.pagination();

    let stores = state
        .repo
        .list_report_stores(auth.tenant_id, query.store_id)
        .await?;
    if let (Some(store_id), true) = (query.store_id, stores.is_empty()) {
        return Err(AppError::not_found("store", store_id));
    }

    let params = ReportParams::new(&stores, range, query.status(), pagination.clone());
    let output = state
        .reports
        .report(namespace, auth.tenant_id, &stores, &params)
        .await?;

    debug!(
        tenant_id = %auth.tenant_id,
        namespace = %namespace,
        stores = stores.len(),
        request_id = %auth.request_id,
        "Report served"
    );

    let response = match output.total {
        Some(total) => ApiResponse::paginated(
            output.data,
            PageMeta::new(total, pagination.page, pagination.limit),
        ),
        None => ApiResponse::ok(output.data),
    };
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_report_is_not_found() {
        assert!(matches!(
            parse_namespace("customers"),
            Err(AppError::NotFound { .. })
        ));
        assert_eq!(parse_namespace("refunds").unwrap(), CacheNamespace::Refunds);
    }

    #[test]
    fn test_stockist_sees_inventory_only() {
        assert!(ensure_visible(Role::Stockist, CacheNamespace::Inventory).is_ok());
        assert!(ensure_visible(Role::Stockist, CacheNamespace::Dashboard).is_err());
        assert!(ensure_visible(Role::Stockist, CacheNamespace::Orders).is_err());
        for namespace in CacheNamespace::ALL {
            assert!(ensure_visible(Role::Member, namespace).is_ok());
        }
    }
}
