//! SeaORM entity models
//!
//! Database entities for ShopBoard

mod company;
mod invitation;
mod member;
mod store;
mod user;

pub use company::{
    Entity as CompanyEntity,
    Model as Company,
    ActiveModel as CompanyActiveModel,
    Column as CompanyColumn,
};

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use member::{
    Entity as MemberEntity,
    Model as Member,
    ActiveModel as MemberActiveModel,
    Column as MemberColumn,
};

pub use invitation::{
    Entity as InvitationEntity,
    Model as Invitation,
    ActiveModel as InvitationActiveModel,
    Column as InvitationColumn,
    InvitationStatus,
};

pub use store::{
    Entity as StoreEntity,
    Model as Store,
    ActiveModel as StoreActiveModel,
    Column as StoreColumn,
    StoreStatus,
};
