//! Registration, login and password reset handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use shopboard_common::{
    auth::{generate_token, hash_password, hash_token, verify_password, Role},
    constants::PASSWORD_RESET_TTL,
    dto::{ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest},
    errors::{AppError, Result},
    validation::ValidatedJson,
    ApiResponse,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{expires_in, CompanyView, UserView};
use crate::AppState;

/// Issued session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: UserView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Create an account and the company it administers
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    if state.repo.find_user_by_email(&request.email).await?.is_some() {
        return Err(AppError::Conflict {
            message: "Email is already registered".to_string(),
        });
    }

    let password_hash = hash_password(&request.password)?;
    let (user, company) = state
        .repo
        .register(&request.email, &request.name, password_hash)
        .await?;

    let token = state.jwt.generate_token(user.id, company.id, false)?;

    info!(user_id = %user.id, tenant_id = %company.id, "User registered");

    let body = AuthResponse {
        token,
        expires_in: state.jwt.lifetime_secs(false),
        user: UserView::from(&user),
        company: Some(CompanyView::from(&company)),
        role: Some(Role::Admin),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(body))))
}

/// Exchange credentials for a token scoped to the user's first company
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>> {
    let user = state
        .repo
        .find_user_by_email(&request.email)
        .await?
        .filter(|user| verify_password(&request.password, &user.password_hash))
        .ok_or(AppError::InvalidCredentials)?;

    let membership = state.repo.first_membership(user.id).await?;
    let company = match &membership {
        Some(member) => state.repo.find_company_by_id(member.company_id).await?,
        None => None,
    };
    // Without a company the token can only reach user-level routes
    let tenant_id = company.as_ref().map(|c| c.id).unwrap_or_else(Uuid::nil);

    let token = state
        .jwt
        .generate_token(user.id, tenant_id, request.remember_me)?;

    info!(
        user_id = %user.id,
        tenant_id = %tenant_id,
        remember_me = request.remember_me,
        "User logged in"
    );

    Ok(Json(ApiResponse::ok(AuthResponse {
        token,
        expires_in: state.jwt.lifetime_secs(request.remember_me),
        user: UserView::from(&user),
        company: company.as_ref().map(CompanyView::from),
        role: membership.map(|m| m.role),
    })))
}

/// Start a password reset; the answer never reveals whether the email exists
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    if let Some(user) = state.repo.find_user_by_email(&request.email).await? {
        let token = generate_token();
        let user_id = user.id;
        state
            .repo
            .set_reset_token(user, hash_token(&token), expires_in(PASSWORD_RESET_TTL)?)
            .await?;

        info!(user_id = %user_id, "Password reset requested");
        if state.config.auth.log_reset_tokens {
            debug!(user_id = %user_id, token = %token, "Password reset token issued");
        }
    }

    Ok(Json(ApiResponse::message(
        "If the email is registered, a reset link has been sent",
    )))
}

/// Set a new password with a reset token
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>> {
    let user = state
        .repo
        .find_user_by_reset_token(&hash_token(request.token.trim()))
        .await?
        .ok_or(AppError::InvalidToken)?;

    let user_id = user.id;
    let password_hash = hash_password(&request.password)?;
    state
        .repo
        .complete_password_reset(user, password_hash)
        .await?;

    info!(user_id = %user_id, "Password reset completed");

    Ok(Json(ApiResponse::message("Password has been reset")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_auth_response_shape() {
        let now = Utc::now().fixed_offset();
        let body = AuthResponse {
            token: "t".into(),
            expires_in: 3600,
            user: UserView {
                id: Uuid::nil(),
                email: "ana@example.com".into(),
                name: "Ana".into(),
                created_at: now,
            },
            company: None,
            role: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["expiresIn"], 3600);
        assert_eq!(json["user"]["email"], "ana@example.com");
        assert!(json.get("company").is_none());
        assert!(json["user"].get("passwordHash").is_none());
    }
}
