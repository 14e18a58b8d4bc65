//! Request contracts for every endpoint

pub mod auth;
pub mod company;
pub mod query;
pub mod store;

pub use auth::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
    UpdateProfileRequest,
};
pub use company::{InviteMemberRequest, UpdateCompanyRequest, UpdateMemberRoleRequest};
pub use query::{DateRange, Pagination, PaginationQuery, ReportQuery, SortOrder};
pub use store::{CreateStoreRequest, UpdateStoreRequest};
