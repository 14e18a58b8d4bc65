//! Company (tenant) entity

use crate::plan::{Plan, StoreQuota};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "companies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Base64 image data URL
    #[sea_orm(column_type = "Text", nullable)]
    pub logo: Option<String>,

    pub plan: Plan,

    pub grandfathered: bool,

    pub store_limit_override: Option<i32>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Store quota granted to this company
    pub fn store_quota(&self) -> StoreQuota {
        let legacy = self
            .store_limit_override
            .and_then(|limit| u32::try_from(limit).ok());
        StoreQuota::for_company(self.plan, self.grandfathered, legacy)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::member::Entity")]
    Members,

    #[sea_orm(has_many = "super::store::Entity")]
    Stores,

    #[sea_orm(has_many = "super::invitation::Entity")]
    Invitations,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stores.def()
    }
}

impl Related<super::invitation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invitations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(plan: Plan, grandfathered: bool, legacy: Option<i32>) -> Model {
        let now = chrono::Utc::now().into();
        Model {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            logo: None,
            plan,
            grandfathered,
            store_limit_override: legacy,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_quota_follows_plan() {
        assert_eq!(company(Plan::Free, false, None).store_quota().limit, 2);
        assert_eq!(company(Plan::Pro, false, Some(8)).store_quota().limit, 5);
    }

    #[test]
    fn test_grandfathered_override() {
        assert_eq!(company(Plan::Free, true, Some(4)).store_quota().limit, 4);
        assert_eq!(company(Plan::Free, true, Some(-1)).store_quota().limit, 2);
    }
}
