//! Subscription plans and the store quota they grant

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{AppError, Result};

/// Subscription tier of a company
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    #[sea_orm(string_value = "FREE")]
    Free,
    #[sea_orm(string_value = "PRO")]
    Pro,
    #[sea_orm(string_value = "ENTERPRISE")]
    Enterprise,
}

impl Plan {
    /// Maximum number of stores a company on this plan may own
    pub const fn store_limit(&self) -> u32 {
        match self {
            Plan::Free => 2,
            Plan::Pro => 5,
            Plan::Enterprise => 10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "FREE",
            Plan::Pro => "PRO",
            Plan::Enterprise => "ENTERPRISE",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(Plan::Free),
            "PRO" => Ok(Plan::Pro),
            "ENTERPRISE" => Ok(Plan::Enterprise),
            other => Err(format!("unknown plan: {}", other)),
        }
    }
}

/// Effective store quota for one company
///
/// A grandfathered company keeps the limit recorded in
/// `store_limit_override` when it subscribed; the override is ignored for
/// companies that are not grandfathered, and a grandfathered company without a
/// recorded override falls back to its plan's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreQuota {
    pub plan: Plan,
    pub limit: u32,
}

impl StoreQuota {
    pub fn for_company(plan: Plan, grandfathered: bool, store_limit_override: Option<u32>) -> Self {
        let limit = match (grandfathered, store_limit_override) {
            (true, Some(legacy)) => legacy,
            _ => plan.store_limit(),
        };
        Self { plan, limit }
    }

    /// Whether one more store fits
    pub fn allows_another(&self, current: u64) -> bool {
        current < u64::from(self.limit)
    }

    /// Reject when the company is at or above its limit
    pub fn check(&self, current: u64) -> Result<()> {
        if self.allows_another(current) {
            return Ok(());
        }
        Err(AppError::QuotaExceeded {
            plan: self.plan.to_string(),
            limit: self.limit,
            current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_plan_limits() {
        assert_eq!(Plan::Free.store_limit(), 2);
        assert_eq!(Plan::Pro.store_limit(), 5);
        assert_eq!(Plan::Enterprise.store_limit(), 10);
    }

    #[test]
    fn test_free_plan_rejects_third_store() {
        let quota = StoreQuota::for_company(Plan::Free, false, None);
        let err = quota.check(2).unwrap_err();
        assert_eq!(err.code(), ErrorCode::QuotaExceeded);
    }

    #[test]
    fn test_pro_plan_accepts_third_store() {
        let quota = StoreQuota::for_company(Plan::Pro, false, None);
        assert!(quota.check(2).is_ok());
        assert!(quota.check(5).is_err());
    }

    #[test]
    fn test_override_only_applies_to_grandfathered() {
        let grandfathered = StoreQuota::for_company(Plan::Free, true, Some(3));
        assert_eq!(grandfathered.limit, 3);
        assert!(grandfathered.check(2).is_ok());

        let regular = StoreQuota::for_company(Plan::Free, false, Some(3));
        assert_eq!(regular.limit, 2);

        let no_record = StoreQuota::for_company(Plan::Pro, true, None);
        assert_eq!(no_record.limit, 5);
    }

    #[test]
    fn test_plan_serde_names() {
        assert_eq!(serde_json::to_string(&Plan::Enterprise).unwrap(), "\"ENTERPRISE\"");
        assert_eq!("PRO".parse::<Plan>(), Ok(Plan::Pro));
    }
}
