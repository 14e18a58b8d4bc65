//! Pending and settled invitations to join a company

use crate::auth::Role;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "revoked")]
    Revoked,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invitations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub company_id: Uuid,

    /// Stored lowercased
    #[sea_orm(column_type = "Text")]
    pub email: String,

    pub role: Role,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", unique)]
    pub token_hash: String,

    pub status: InvitationStatus,

    pub invited_by: Uuid,

    pub expires_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Pending and not yet expired
    pub fn is_open(&self, now: DateTimeWithTimeZone) -> bool {
        self.status == InvitationStatus::Pending && self.expires_at > now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_is_open() {
        let now = Utc::now();
        let mut invitation = Model {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            email: "a@b.co".into(),
            role: Role::Member,
            token_hash: "h".into(),
            status: InvitationStatus::Pending,
            invited_by: Uuid::new_v4(),
            expires_at: (now + Duration::days(1)).into(),
            created_at: now.into(),
            updated_at: now.into(),
        };
        assert!(invitation.is_open(now.into()));
        assert!(!invitation.is_open((now + Duration::days(2)).into()));

        invitation.status = InvitationStatus::Revoked;
        assert!(!invitation.is_open(now.into()));
    }
}
