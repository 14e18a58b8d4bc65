//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.

use crate::auth::Role;
use crate::db::models::*;
use crate::db::DbPool;
use crate::dto::{CreateStoreRequest, Pagination, SortOrder, UpdateCompanyRequest, UpdateStoreRequest};
use crate::errors::{AppError, Result};
use crate::plan::{Plan, StoreQuota};
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    SqlErr, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

/// A member joined with the user it belongs to
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberWithUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub joined_at: DateTimeWithTimeZone,
}

/// Turn a unique-constraint violation into a conflict
fn conflict_on_unique(err: DbErr, message: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict {
            message: message.to_string(),
        },
        _ => AppError::Database(err),
    }
}

/// Company row held `FOR UPDATE`; serializes quota and admin checks per tenant
fn lock_company(company_id: Uuid) -> Select<CompanyEntity> {
    CompanyEntity::find_by_id(company_id).lock_exclusive()
}

async fn count_admins<C: ConnectionTrait>(conn: &C, company_id: Uuid) -> Result<u64> {
    MemberEntity::find()
        .filter(MemberColumn::CompanyId.eq(company_id))
        .filter(MemberColumn::Role.eq(Role::Admin))
        .count(conn)
        .await
        .map_err(Into::into)
}

/// Reject a change that would leave the company without an administrator
fn keeps_an_admin(target: Role, new_role: Option<Role>, admins: u64) -> Result<()> {
    let demotes_admin = target == Role::Admin && new_role != Some(Role::Admin);
    if demotes_admin && admins <= 1 {
        return Err(AppError::Conflict {
            message: "A company must keep at least one ADMIN".to_string(),
        });
    }
    Ok(())
}

/// Canonical form of a user supplied address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Stored form of a store URL
pub fn normalize_store_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by email (case-insensitive)
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(normalize_email(email)))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Create a user together with a FREE company they administer
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password_hash: String,
    ) -> Result<(User, Company)> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let name = name.trim().to_string();
        let txn = self.write_conn().begin().await?;

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(normalize_email(email)),
            name: Set(name.clone()),
            password_hash: Set(password_hash),
            reset_token_hash: Set(None),
            reset_token_expires_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| conflict_on_unique(e, "Email is already registered"))?;

        let company = CompanyActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            logo: Set(None),
            plan: Set(Plan::Free),
            grandfathered: Set(false),
            store_limit_override: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        MemberActiveModel {
            company_id: Set(company.id),
            user_id: Set(user.id),
            role: Set(Role::Admin),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok((user, company))
    }

    /// Update name and/or password hash; `None` keeps the stored value
    pub async fn update_user(
        &self,
        user: User,
        name: Option<&str>,
        password_hash: Option<String>,
    ) -> Result<User> {
        let mut active = user.into_active_model();
        if let Some(name) = name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(hash) = password_hash {
            active.password_hash = Set(hash);
        }
        active.updated_at = Set(Utc::now().into());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Record a pending password reset
    pub async fn set_reset_token(
        &self,
        user: User,
        token_hash: String,
        expires_at: DateTimeWithTimeZone,
    ) -> Result<()> {
        let mut active = user.into_active_model();
        active.reset_token_hash = Set(Some(token_hash));
        active.reset_token_expires_at = Set(Some(expires_at));
        active.updated_at = Set(Utc::now().into());
        active.update(self.write_conn()).await?;
        Ok(())
    }

    /// Find the user holding an unexpired reset token
    pub async fn find_user_by_reset_token(&self, token_hash: &str) -> Result<Option<User>> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        UserEntity::find()
            .filter(UserColumn::ResetTokenHash.eq(token_hash))
            .filter(UserColumn::ResetTokenExpiresAt.gt(now))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Store the new password and consume the reset token
    pub async fn complete_password_reset(&self, user: User, password_hash: String) -> Result<()> {
        let mut active = user.into_active_model();
        active.password_hash = Set(password_hash);
        active.reset_token_hash = Set(None);
        active.reset_token_expires_at = Set(None);
        active.updated_at = Set(Utc::now().into());
        active.update(self.write_conn()).await?;
        Ok(())
    }

    // ========================================================================
    // Company Operations
    // ========================================================================

    /// Find company by ID
    pub async fn find_company_by_id(&self, id: Uuid) -> Result<Option<Company>> {
        CompanyEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Apply a partial company update
    pub async fn update_company(
        &self,
        company: Company,
        changes: &UpdateCompanyRequest,
    ) -> Result<Company> {
        let mut active = company.into_active_model();
        if let Some(ref name) = changes.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(ref logo) = changes.logo {
            active.logo = Set(Some(logo.clone()));
        }
        active.updated_at = Set(Utc::now().into());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Member Operations
    // ========================================================================

    /// Membership of one user in one company
    pub async fn find_member(&self, company_id: Uuid, user_id: Uuid) -> Result<Option<Member>> {
        MemberEntity::find_by_id((company_id, user_id))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Oldest membership of a user, used to pick the company at login
    pub async fn first_membership(&self, user_id: Uuid) -> Result<Option<Member>> {
        MemberEntity::find()
            .filter(MemberColumn::UserId.eq(user_id))
            .order_by_asc(MemberColumn::CreatedAt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// All members of a company with their user details
    pub async fn list_members(&self, company_id: Uuid) -> Result<Vec<MemberWithUser>> {
        let rows = MemberEntity::find()
            .filter(MemberColumn::CompanyId.eq(company_id))
            .order_by_asc(MemberColumn::CreatedAt)
            .find_also_related(UserEntity)
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(member, user)| {
                user.map(|user| MemberWithUser {
                    user_id: member.user_id,
                    email: user.email,
                    name: user.name,
                    role: member.role,
                    joined_at: member.created_at,
                })
            })
            .collect())
    }

    /// Change a member's role; the last admin cannot be demoted
    ///
    /// Returns `None` when the user is not a member of the company.
    pub async fn update_member_role(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<Option<Member>> {
        let txn = self.write_conn().begin().await?;
        lock_company(company_id).one(&txn).await?;

        let Some(member) = MemberEntity::find_by_id((company_id, user_id)).one(&txn).await? else {
            return Ok(None);
        };
        if member.role == Role::Admin {
            keeps_an_admin(member.role, Some(role), count_admins(&txn, company_id).await?)?;
        }

        let mut active = member.into_active_model();
        active.role = Set(role);
        active.updated_at = Set(Utc::now().into());
        let member = active.update(&txn).await?;

        txn.commit().await?;
        Ok(Some(member))
    }

    /// Remove a member from a company; the last admin cannot leave
    pub async fn remove_member(&self, company_id: Uuid, user_id: Uuid) -> Result<bool> {
        let txn = self.write_conn().begin().await?;
        lock_company(company_id).one(&txn).await?;

        let Some(member) = MemberEntity::find_by_id((company_id, user_id)).one(&txn).await? else {
            return Ok(false);
        };
        if member.role == Role::Admin {
            keeps_an_admin(member.role, None, count_admins(&txn, company_id).await?)?;
        }

        let result = MemberEntity::delete_by_id((company_id, user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Invitation Operations
    // ========================================================================

    /// Pending invitation for an address in a company
    pub async fn find_pending_invitation(
        &self,
        company_id: Uuid,
        email: &str,
    ) -> Result<Option<Invitation>> {
        InvitationEntity::find()
            .filter(InvitationColumn::CompanyId.eq(company_id))
            .filter(InvitationColumn::Email.eq(normalize_email(email)))
            .filter(InvitationColumn::Status.eq(InvitationStatus::Pending))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Create a pending invitation
    pub async fn create_invitation(
        &self,
        company_id: Uuid,
        email: &str,
        role: Role,
        token_hash: String,
        invited_by: Uuid,
        expires_at: DateTimeWithTimeZone,
    ) -> Result<Invitation> {
        let now: DateTimeWithTimeZone = Utc::now().into();

        InvitationActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            email: Set(normalize_email(email)),
            role: Set(role),
            token_hash: Set(token_hash),
            status: Set(InvitationStatus::Pending),
            invited_by: Set(invited_by),
            expires_at: Set(expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.write_conn())
        .await
        .map_err(|e| conflict_on_unique(e, "An invitation for this email is already pending"))
    }

    /// Pending invitations of a company, newest first
    pub async fn list_pending_invitations(&self, company_id: Uuid) -> Result<Vec<Invitation>> {
        InvitationEntity::find()
            .filter(InvitationColumn::CompanyId.eq(company_id))
            .filter(InvitationColumn::Status.eq(InvitationStatus::Pending))
            .order_by_desc(InvitationColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find invitation by token hash
    pub async fn find_invitation_by_token_hash(&self, token_hash: &str) -> Result<Option<Invitation>> {
        InvitationEntity::find()
            .filter(InvitationColumn::TokenHash.eq(token_hash))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Revoke a pending invitation
    pub async fn revoke_invitation(&self, company_id: Uuid, id: Uuid) -> Result<bool> {
        let result = InvitationEntity::update_many()
            .col_expr(InvitationColumn::Status, Expr::value(InvitationStatus::Revoked))
            .col_expr(
                InvitationColumn::UpdatedAt,
                Expr::value(DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(InvitationColumn::Id.eq(id))
            .filter(InvitationColumn::CompanyId.eq(company_id))
            .filter(InvitationColumn::Status.eq(InvitationStatus::Pending))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Mark the invitation accepted and add the member in one transaction
    pub async fn accept_invitation(&self, invitation: Invitation, user_id: Uuid) -> Result<Member> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let company_id = invitation.company_id;
        let role = invitation.role;
        let txn = self.write_conn().begin().await?;

        let mut active = invitation.into_active_model();
        active.status = Set(InvitationStatus::Accepted);
        active.updated_at = Set(now);
        active.update(&txn).await?;

        let member = MemberActiveModel {
            company_id: Set(company_id),
            user_id: Set(user_id),
            role: Set(role),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| conflict_on_unique(e, "Already a member of this company"))?;

        txn.commit().await?;
        Ok(member)
    }

    // ========================================================================
    // Store Operations
    // ========================================================================

    /// Number of stores that count against the plan
    pub async fn count_live_stores(&self, company_id: Uuid) -> Result<u64> {
        StoreEntity::find()
            .filter(StoreColumn::CompanyId.eq(company_id))
            .filter(StoreColumn::DeletedAt.is_null())
            .count(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Insert a store after checking the company's quota
    pub async fn create_store(
        &self,
        company_id: Uuid,
        quota: StoreQuota,
        input: &CreateStoreRequest,
    ) -> Result<Store> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let txn = self.write_conn().begin().await?;
        lock_company(company_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("company", company_id))?;

        let current = StoreEntity::find()
            .filter(StoreColumn::CompanyId.eq(company_id))
            .filter(StoreColumn::DeletedAt.is_null())
            .count(&txn)
            .await?;
        quota.check(current)?;

        let store = StoreActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            name: Set(input.name.trim().to_string()),
            url: Set(normalize_store_url(&input.url)),
            consumer_key: Set(input.consumer_key.clone()),
            consumer_secret: Set(input.consumer_secret.clone()),
            status: Set(StoreStatus::Active),
            commission_rate: Set(input.commission_rate.unwrap_or(0.0)),
            shipping_cost: Set(input.shipping_cost.unwrap_or(0.0)),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(store)
    }

    /// Find a live store within a company
    pub async fn find_store(&self, company_id: Uuid, id: Uuid) -> Result<Option<Store>> {
        StoreEntity::find_by_id(id)
            .filter(StoreColumn::CompanyId.eq(company_id))
            .filter(StoreColumn::DeletedAt.is_null())
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List live stores for a company with pagination
    pub async fn list_stores(
        &self,
        company_id: Uuid,
        pagination: &Pagination,
    ) -> Result<(Vec<Store>, u64)> {
        let column = match pagination.sort_by.as_deref() {
            Some("name") => StoreColumn::Name,
            Some("updatedAt") => StoreColumn::UpdatedAt,
            Some("status") => StoreColumn::Status,
            _ => StoreColumn::CreatedAt,
        };
        let order = match pagination.sort_order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };

        let paginator = StoreEntity::find()
            .filter(StoreColumn::CompanyId.eq(company_id))
            .filter(StoreColumn::DeletedAt.is_null())
            .order_by(column, order)
            .paginate(self.read_conn(), pagination.limit);

        let total = paginator.num_items().await?;
        let stores = paginator.fetch_page(pagination.page.saturating_sub(1)).await?;

        Ok((stores, total))
    }

    /// Active stores feeding reports, optionally narrowed to one
    pub async fn list_report_stores(
        &self,
        company_id: Uuid,
        store_id: Option<Uuid>,
    ) -> Result<Vec<Store>> {
        let mut query = StoreEntity::find()
            .filter(StoreColumn::CompanyId.eq(company_id))
            .filter(StoreColumn::DeletedAt.is_null())
            .filter(StoreColumn::Status.eq(StoreStatus::Active));
        if let Some(id) = store_id {
            query = query.filter(StoreColumn::Id.eq(id));
        }
        query
            .order_by_asc(StoreColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Apply a partial store update
    pub async fn update_store(&self, store: Store, changes: &UpdateStoreRequest) -> Result<Store> {
        let mut active = store.into_active_model();
        if let Some(status) = changes.status.as_deref().and_then(|s| s.parse().ok()) {
            active.status = Set(status);
        }
        if let Some(ref name) = changes.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(ref url) = changes.url {
            active.url = Set(normalize_store_url(url));
        }
        if let Some(ref key) = changes.consumer_key {
            active.consumer_key = Set(key.clone());
        }
        if let Some(ref secret) = changes.consumer_secret {
            active.consumer_secret = Set(secret.clone());
        }
        if let Some(rate) = changes.commission_rate {
            active.commission_rate = Set(rate);
        }
        if let Some(cost) = changes.shipping_cost {
            active.shipping_cost = Set(cost);
        }
        active.updated_at = Set(Utc::now().into());
        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Soft delete a store; it stops counting against the plan
    pub async fn soft_delete_store(&self, company_id: Uuid, id: Uuid) -> Result<bool> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let result = StoreEntity::update_many()
            .col_expr(StoreColumn::DeletedAt, Expr::value(now))
            .col_expr(StoreColumn::UpdatedAt, Expr::value(now))
            .filter(StoreColumn::Id.eq(id))
            .filter(StoreColumn::CompanyId.eq(company_id))
            .filter(StoreColumn::DeletedAt.is_null())
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn test_normalize_store_url() {
        assert_eq!(normalize_store_url(" https://shop.test/ "), "https://shop.test");
        assert_eq!(normalize_store_url("shop.test/store//"), "shop.test/store");
    }

    #[test]
    fn test_company_lock_is_row_exclusive() {
        use sea_orm::{DbBackend, QueryTrait};

        let sql = lock_company(Uuid::nil()).build(DbBackend::Postgres).to_string();
        assert!(sql.contains(r#"FROM "companies""#), "{sql}");
        assert!(sql.ends_with("FOR UPDATE"), "{sql}");
    }

    #[test]
    fn test_last_admin_is_protected() {
        assert!(keeps_an_admin(Role::Admin, Some(Role::Member), 1).is_err());
        assert!(keeps_an_admin(Role::Admin, None, 1).is_err());
        assert!(keeps_an_admin(Role::Admin, Some(Role::Admin), 1).is_ok());
        assert!(keeps_an_admin(Role::Admin, None, 2).is_ok());
        assert!(keeps_an_admin(Role::Stockist, None, 0).is_ok());
    }

    #[test]
    fn test_unique_violation_is_not_a_conflict_for_other_errors() {
        let err = conflict_on_unique(DbErr::Custom("boom".into()), "dup");
        assert!(matches!(err, AppError::Database(_)));
    }
}
