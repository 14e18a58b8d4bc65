//! Membership and invitation handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use shopboard_common::{
    auth::{generate_token, hash_token, AuthContext, Role},
    constants::INVITATION_TTL,
    db::{models::Invitation, normalize_email, MemberWithUser},
    dto::{InviteMemberRequest, UpdateMemberRoleRequest},
    errors::{AppError, Result},
    validation::{field_error, Locale, ValidatedJson},
    ApiResponse,
};
use tracing::info;
use uuid::Uuid;

use super::{authorize, expires_in, CompanyView, ADMIN_ONLY, ANY_ROLE};
use crate::AppState;

/// Pending invitation as shown to admins
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub invited_by: Uuid,
    pub expires_at: DateTime<FixedOffset>,
    pub created_at: DateTime<FixedOffset>,
    /// Only present in the response that created the invitation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<&Invitation> for InvitationView {
    fn from(invitation: &Invitation) -> Self {
        Self {
            id: invitation.id,
            email: invitation.email.clone(),
            role: invitation.role,
            invited_by: invitation.invited_by,
            expires_at: invitation.expires_at,
            created_at: invitation.created_at,
            token: None,
        }
    }
}

/// Result of accepting an invitation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationResponse {
    pub token: String,
    pub expires_in: i64,
    pub company: CompanyView,
    pub role: Role,
}

/// What to do with an invite when one is already pending for the address
#[derive(Debug, PartialEq, Eq)]
enum PendingInvite {
    /// Same role and still open: hand back the existing invitation
    Reuse,
    /// Expired: replace it
    Replace,
    Conflict,
}

fn pending_invite(existing: &Invitation, role: Role, now: DateTime<FixedOffset>) -> PendingInvite {
    if !existing.is_open(now) {
        PendingInvite::Replace
    } else if existing.role == role {
        PendingInvite::Reuse
    } else {
        PendingInvite::Conflict
    }
}

/// Members of the company
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<MemberWithUser>>>> {
    authorize(&state.repo, &auth, ANY_ROLE).await?;
    let members = state.repo.list_members(auth.tenant_id).await?;
    Ok(Json(ApiResponse::ok(members)))
}

/// Pending invitations of the company
pub async fn list_invitations(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiResponse<Vec<InvitationView>>>> {
    authorize(&state.repo, &auth, ADMIN_ONLY).await?;
    let invitations = state.repo.list_pending_invitations(auth.tenant_id).await?;
    Ok(Json(ApiResponse::ok(
        invitations.iter().map(InvitationView::from).collect(),
    )))
}

/// Invite an address with a role
///
/// The plain token is returned once; only its hash is stored.
pub async fn invite_member(
    State(state): State<AppState>,
    auth: AuthContext,
    locale: Locale,
    ValidatedJson(request): ValidatedJson<InviteMemberRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InvitationView>>)> {
    authorize(&state.repo, &auth, ADMIN_ONLY).await?;
    let role = request
        .role()
        .ok_or_else(|| field_error("role", "role", locale))?;
    let email = normalize_email(&request.email);

    if let Some(user) = state.repo.find_user_by_email(&email).await? {
        if state.repo.find_member(auth.tenant_id, user.id).await?.is_some() {
            return Err(AppError::Conflict {
                message: "This user is already a member".to_string(),
            });
        }
    }

    if let Some(existing) = state.repo.find_pending_invitation(auth.tenant_id, &email).await? {
        match pending_invite(&existing, role, Utc::now().fixed_offset()) {
            PendingInvite::Reuse => {
                return Ok((
                    StatusCode::OK,
                    Json(ApiResponse::ok(InvitationView::from(&existing))),
                ));
            }
            PendingInvite::Conflict => {
                return Err(AppError::Conflict {
                    message: format!(
                        "An invitation with role {} is already pending for this email",
                        existing.role
                    ),
                });
            }
            PendingInvite::Replace => {
                state.repo.revoke_invitation(auth.tenant_id, existing.id).await?;
            }
        }
    }

    let token = generate_token();
    let invitation = state
        .repo
        .create_invitation(
            auth.tenant_id,
            &email,
            role,
            hash_token(&token),
            auth.user_id,
            expires_in(INVITATION_TTL)?,
        )
        .await?;

    info!(
        tenant_id = %auth.tenant_id,
        invitation_id = %invitation.id,
        role = %role,
        "Member invited"
    );

    let mut view = InvitationView::from(&invitation);
    view.token = Some(token);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(view))))
}

/// Revoke a pending invitation
pub async fn revoke_invitation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    authorize(&state.repo, &auth, ADMIN_ONLY).await?;

    if !state.repo.revoke_invitation(auth.tenant_id, id).await? {
        return Err(AppError::not_found("invitation", id));
    }

    info!(tenant_id = %auth.tenant_id, invitation_id = %id, "Invitation revoked");
    Ok(Json(ApiResponse::message("Invitation revoked")))
}

/// Join the inviting company; answers with a token scoped to it
pub async fn accept_invitation(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<AcceptInvitationResponse>>> {
    let invitation = state
        .repo
        .find_invitation_by_token_hash(&hash_token(token.trim()))
        .await?
        .filter(|inv| inv.is_open(Utc::now().fixed_offset()))
        .ok_or_else(|| AppError::not_found("invitation", "token"))?;

    let user = state
        .repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", auth.user_id))?;
    if normalize_email(&user.email) != invitation.email {
        return Err(AppError::Forbidden {
            message: "This invitation was sent to a different email".to_string(),
        });
    }

    let company = state
        .repo
        .find_company_by_id(invitation.company_id)
        .await?
        .ok_or_else(|| AppError::not_found("company", invitation.company_id))?;

    let member = state.repo.accept_invitation(invitation, user.id).await?;
    let token = state.jwt.generate_token(user.id, company.id, false)?;

    info!(
        tenant_id = %company.id,
        user_id = %user.id,
        role = %member.role,
        "Invitation accepted"
    );

    Ok(Json(ApiResponse::ok(AcceptInvitationResponse {
        token,
        expires_in: state.jwt.lifetime_secs(false),
        company: CompanyView::from(&company),
        role: member.role,
    })))
}

/// Change a member's role
pub async fn update_member_role(
    State(state): State<AppState>,
    auth: AuthContext,
    locale: Locale,
    Path(user_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateMemberRoleRequest>,
) -> Result<Json<ApiResponse<MemberRoleView>>> {
    authorize(&state.repo, &auth, ADMIN_ONLY).await?;
    let role = request
        .role()
        .ok_or_else(|| field_error("role", "role", locale))?;

    let member = state
        .repo
        .update_member_role(auth.tenant_id, user_id, role)
        .await?
        .ok_or_else(|| AppError::not_found("member", user_id))?;

    info!(
        tenant_id = %auth.tenant_id,
        user_id = %user_id,
        role = %role,
        "Member role changed"
    );

    Ok(Json(ApiResponse::ok(MemberRoleView {
        user_id: member.user_id,
        role: member.role,
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRoleView {
    pub user_id: Uuid,
    pub role: Role,
}

/// Remove a member from the company
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    authorize(&state.repo, &auth, ADMIN_ONLY).await?;

    if !state.repo.remove_member(auth.tenant_id, user_id).await? {
        return Err(AppError::not_found("member", user_id));
    }

    info!(tenant_id = %auth.tenant_id, user_id = %user_id, "Member removed");
    Ok(Json(ApiResponse::message("Member removed")))
}
