//! Authentication and profile contracts

use serde::Deserialize;
use validator::Validate;

use crate::validation::rules;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email(code = "email"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(custom(function = "rules::not_blank"))]
    pub token: String,

    #[validate(
        length(min = 8, max = 50, code = "password_length"),
        custom(function = "rules::password_composition")
    )]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(code = "email"))]
    pub email: String,

    #[validate(length(min = 1, code = "required"))]
    pub password: String,

    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(code = "email"))]
    pub email: String,

    #[validate(custom(function = "rules::trimmed_name"))]
    pub name: String,

    /// Length and composition are reported independently
    #[validate(
        length(min = 8, max = 50, code = "password_length"),
        custom(function = "rules::password_composition")
    )]
    pub password: String,
}

/// Partial profile update
///
/// A present `new_password` must be accompanied by `current_password`; the
/// profile handler verifies it against the stored hash before applying.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(custom(function = "rules::trimmed_name"))]
    pub name: Option<String>,

    pub current_password: Option<String>,

    #[validate(
        length(min = 6, code = "new_password_length"),
        custom(function = "rules::password_composition")
    )]
    pub new_password: Option<String>,
}
