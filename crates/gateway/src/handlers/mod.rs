//! API handlers module

pub mod auth;
pub mod company;
pub mod health;
pub mod members;
pub mod profile;
pub mod reports;
pub mod stores;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use shopboard_common::{
    auth::{AuthContext, Role},
    db::models::{Company, Member, User},
    errors::{AppError, Result},
    plan::Plan,
    Repository,
};
use uuid::Uuid;

/// Every role of a company
pub const ANY_ROLE: &[Role] = &[Role::Admin, Role::Member, Role::Stockist];

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Load the caller's membership in the token's company and check its role
///
/// Roles are read on every request so a demotion applies to tokens already
/// issued.
pub async fn authorize(repo: &Repository, auth: &AuthContext, allowed: &[Role]) -> Result<Member> {
    let member = repo.find_member(auth.tenant_id, auth.user_id).await?;
    check_role(member, allowed)
}

fn check_role(member: Option<Member>, allowed: &[Role]) -> Result<Member> {
    let member = member.ok_or_else(|| AppError::Forbidden {
        message: "Not a member of this company".to_string(),
    })?;
    member.role.require(allowed)?;
    Ok(member)
}

/// Absolute expiry `ttl` from now
pub fn expires_in(ttl: std::time::Duration) -> Result<DateTime<FixedOffset>> {
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| AppError::Internal {
        message: format!("Invalid token lifetime: {}", e),
    })?;
    Ok((Utc::now() + ttl).fixed_offset())
}

/// Public view of a user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<FixedOffset>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            created_at: user.created_at,
        }
    }
}

/// Public view of a company with its effective store limit
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyView {
    pub id: Uuid,
    pub name: String,
    pub logo: Option<String>,
    pub plan: Plan,
    pub grandfathered: bool,
    pub store_limit: u32,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<&Company> for CompanyView {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id,
            name: company.name.clone(),
            logo: company.logo.clone(),
            plan: company.plan,
            grandfathered: company.grandfathered,
            store_limit: company.store_quota().limit,
            created_at: company.created_at,
            updated_at: company.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(role: Role) -> Member {
        let now = Utc::now().fixed_offset();
        Member {
            company_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_matrix() {
        assert!(check_role(Some(member(Role::Admin)), ADMIN_ONLY).is_ok());
        assert!(check_role(Some(member(Role::Stockist)), ANY_ROLE).is_ok());

        let denied = check_role(Some(member(Role::Member)), ADMIN_ONLY).unwrap_err();
        assert!(matches!(denied, AppError::Forbidden { .. }));
    }

    #[test]
    fn test_non_member_is_forbidden() {
        let err = check_role(None, ANY_ROLE).unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
    }

    #[test]
    fn test_expiry_is_in_the_future() {
        let expiry = expires_in(std::time::Duration::from_secs(3600)).unwrap();
        let remaining = expiry.signed_duration_since(Utc::now());
        assert!(remaining.num_seconds() > 3590);
    }

    #[test]
    fn test_company_view_exposes_effective_limit() {
        let now = Utc::now().fixed_offset();
        let company = Company {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            logo: None,
            plan: Plan::Free,
            grandfathered: true,
            store_limit_override: Some(4),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(CompanyView::from(&company)).unwrap();
        assert_eq!(json["storeLimit"], 4);
        assert_eq!(json["plan"], "FREE");
    }
}
