//! User entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Stored lowercased
    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text")]
    pub password_hash: String,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub reset_token_hash: Option<String>,

    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::member::Entity")]
    Memberships,
}

impl Related<super::member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
