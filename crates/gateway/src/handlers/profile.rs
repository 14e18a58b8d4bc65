//! Profile of the authenticated user

use axum::{extract::State, Json};
use serde::Serialize;
use shopboard_common::{
    auth::{hash_password, verify_password, AuthContext, Role},
    db::models::User,
    dto::UpdateProfileRequest,
    errors::{AppError, Result},
    validation::{field_error, Locale, ValidatedJson},
    ApiResponse,
};
use tracing::info;

use super::{CompanyView, UserView};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: UserView,
    pub company: Option<CompanyView>,
    pub role: Option<Role>,
}

async fn current_user(state: &AppState, auth: &AuthContext) -> Result<User> {
    state
        .repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", auth.user_id))
}

/// Current user with the company and role of the token
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<ProfileResponse>>> {
    let user = current_user(&state, &auth).await?;
    let member = state.repo.find_member(auth.tenant_id, auth.user_id).await?;
    let company = match member {
        Some(_) => state.repo.find_company_by_id(auth.tenant_id).await?,
        None => None,
    };

    Ok(Json(ApiResponse::ok(ProfileResponse {
        user: UserView::from(&user),
        company: company.as_ref().map(CompanyView::from),
        role: member.map(|m| m.role),
    })))
}

/// Hash for a requested password change after checking the current one
fn password_change(
    request: &UpdateProfileRequest,
    stored_hash: &str,
    locale: Locale,
) -> Result<Option<String>> {
    let Some(new_password) = request.new_password.as_deref() else {
        return Ok(None);
    };
    let current = request
        .current_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| field_error("currentPassword", "required", locale))?;
    if !verify_password(current, stored_hash) {
        return Err(field_error("currentPassword", "password_incorrect", locale));
    }
    hash_password(new_password).map(Some)
}

/// Change name and/or password
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthContext,
    locale: Locale,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserView>>> {
    let user = current_user(&state, &auth).await?;
    let password_hash = password_change(&request, &user.password_hash, locale)?;
    let password_changed = password_hash.is_some();

    let user = state
        .repo
        .update_user(user, request.name.as_deref(), password_hash)
        .await?;

    info!(user_id = %user.id, password_changed, "Profile updated");

    Ok(Json(
        ApiResponse::ok(UserView::from(&user)).with_message("Profile updated"),
    ))
}
