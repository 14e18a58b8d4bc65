//! Store management contracts

use serde::Deserialize;
use validator::Validate;

use crate::validation::rules;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoreRequest {
    #[validate(custom(function = "rules::trimmed_name"))]
    pub name: String,

    #[validate(custom(function = "rules::store_url"))]
    pub url: String,

    #[validate(length(min = 32, code = "credential_length"))]
    pub consumer_key: String,

    #[validate(length(min = 32, code = "credential_length"))]
    pub consumer_secret: String,

    #[validate(range(min = 0.0, max = 100.0, code = "commission_range"))]
    pub commission_rate: Option<f64>,

    #[validate(range(min = 0.0, code = "shipping_range"))]
    pub shipping_cost: Option<f64>,
}

/// Partial store update: absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStoreRequest {
    #[validate(custom(function = "rules::store_status"))]
    pub status: Option<String>,

    #[validate(custom(function = "rules::trimmed_name"))]
    pub name: Option<String>,

    #[validate(custom(function = "rules::store_url"))]
    pub url: Option<String>,

    #[validate(length(min = 32, code = "credential_length"))]
    pub consumer_key: Option<String>,

    #[validate(length(min = 32, code = "credential_length"))]
    pub consumer_secret: Option<String>,

    #[validate(range(min = 0.0, max = 100.0, code = "commission_range"))]
    pub commission_rate: Option<f64>,

    #[validate(range(min = 0.0, code = "shipping_range"))]
    pub shipping_cost: Option<f64>,
}

impl UpdateStoreRequest {
    /// Whether a change could alter report results
    pub fn touches_reports(&self) -> bool {
        self.url.is_some()
            || self.consumer_key.is_some()
            || self.consumer_secret.is_some()
            || self.commission_rate.is_some()
            || self.shipping_cost.is_some()
            || self.status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(key_len: usize, secret_len: usize) -> CreateStoreRequest {
        CreateStoreRequest {
            name: "Main Store".into(),
            url: "https://shop.example.com".into(),
            consumer_key: "k".repeat(key_len),
            consumer_secret: "s".repeat(secret_len),
            commission_rate: None,
            shipping_cost: None,
        }
    }

    #[test]
    fn test_credential_length_boundary() {
        assert!(create(32, 32).validate().is_ok());
        assert!(create(31, 32).validate().is_err());
        assert!(create(32, 31).validate().is_err());
    }

    #[test]
    fn test_commission_rate_bounds_inclusive() {
        for ok in [0.0, 100.0, 12.5] {
            let request = UpdateStoreRequest {
                commission_rate: Some(ok),
                ..Default::default()
            };
            assert!(request.validate().is_ok(), "{ok}");
        }
        for bad in [-0.01, 100.01, -5.0] {
            let request = UpdateStoreRequest {
                commission_rate: Some(bad),
                ..Default::default()
            };
            assert!(request.validate().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_shipping_cost_minimum() {
        let free = UpdateStoreRequest {
            shipping_cost: Some(0.0),
            ..Default::default()
        };
        assert!(free.validate().is_ok());
        let negative = UpdateStoreRequest {
            shipping_cost: Some(-1.0),
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_update_applies_rules_only_to_present_fields() {
        assert!(UpdateStoreRequest::default().validate().is_ok());
        assert!(!UpdateStoreRequest::default().touches_reports());

        let request: UpdateStoreRequest =
            serde_json::from_str(r#"{"status":"paused","consumerKey":"short"}"#).unwrap();
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert_eq!(fields.len(), 2);
    }
}
