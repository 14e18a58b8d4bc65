//! Company settings handlers

use axum::{extract::State, Json};
use serde::Serialize;
use shopboard_common::{
    auth::AuthContext,
    dto::UpdateCompanyRequest,
    errors::{AppError, Result},
    validation::ValidatedJson,
    ApiResponse,
};
use tracing::info;

use super::{authorize, CompanyView, ADMIN_ONLY, ANY_ROLE};
use crate::AppState;

/// Company plus its current store usage
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyResponse {
    #[serde(flatten)]
    pub company: CompanyView,
    pub store_count: u64,
}

/// Company of the token
pub async fn get_company(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<CompanyResponse>>> {
    authorize(&state.repo, &auth, ANY_ROLE).await?;

    let company = state
        .repo
        .find_company_by_id(auth.tenant_id)
        .await?
        .ok_or_else(|| AppError::not_found("company", auth.tenant_id))?;
    let store_count = state.repo.count_live_stores(company.id).await?;

    Ok(Json(ApiResponse::ok(CompanyResponse {
        company: CompanyView::from(&company),
        store_count,
    })))
}

/// Rename the company or change its logo
pub async fn update_company(
    State(state): State<AppState>,
    auth: AuthContext,
    ValidatedJson(request): ValidatedJson<UpdateCompanyRequest>,
) -> Result<Json<ApiResponse<CompanyView>>> {
    authorize(&state.repo, &auth, ADMIN_ONLY).await?;

    let company = state
        .repo
        .find_company_by_id(auth.tenant_id)
        .await?
        .ok_or_else(|| AppError::not_found("company", auth.tenant_id))?;
    let company = state.repo.update_company(company, &request).await?;

    info!(
        tenant_id = %company.id,
        user_id = %auth.user_id,
        logo_changed = request.logo.is_some(),
        "Company updated"
    );

    Ok(Json(
        ApiResponse::ok(CompanyView::from(&company)).with_message("Company updated"),
    ))
}
