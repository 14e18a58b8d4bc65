//! Company and membership contracts

use serde::Deserialize;
use validator::Validate;

use crate::auth::Role;
use crate::validation::rules;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCompanyRequest {
    #[validate(custom(function = "rules::trimmed_name"))]
    pub name: Option<String>,

    #[validate(custom(function = "rules::logo_data_url"))]
    pub logo: Option<String>,
}

/// Role is kept as text so an unknown value is a field error, not a parse error
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InviteMemberRequest {
    #[validate(email(code = "email"))]
    pub email: String,

    #[validate(custom(function = "rules::member_role"))]
    pub role: String,
}

impl InviteMemberRequest {
    /// Parsed role; only meaningful after validation
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRoleRequest {
    #[validate(custom(function = "rules::member_role"))]
    pub role: String,
}

impl UpdateMemberRoleRequest {
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_role_enumeration() {
        let owner: InviteMemberRequest =
            serde_json::from_str(r#"{"email":"x@example.com","role":"OWNER"}"#).unwrap();
        assert!(owner.validate().is_err());
        assert_eq!(owner.role(), None);

        let stockist: InviteMemberRequest =
            serde_json::from_str(r#"{"email":"x@example.com","role":"STOCKIST"}"#).unwrap();
        assert!(stockist.validate().is_ok());
        assert_eq!(stockist.role(), Some(Role::Stockist));
    }

    #[test]
    fn test_company_logo_prefix() {
        let text = UpdateCompanyRequest {
            logo: Some("data:text/plain;base64,aGVsbG8=".into()),
            ..Default::default()
        };
        assert!(text.validate().is_err());

        let png = UpdateCompanyRequest {
            logo: Some("data:image/png;base64,iVBORw0KGgo=".into()),
            ..Default::default()
        };
        assert!(png.validate().is_ok());
    }

    #[test]
    fn test_company_update_is_partial() {
        assert!(UpdateCompanyRequest::default().validate().is_ok());
        let short = UpdateCompanyRequest {
            name: Some("A".into()),
            ..Default::default()
        };
        assert!(short.validate().is_err());
    }
}
