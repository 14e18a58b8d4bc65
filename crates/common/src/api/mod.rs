//! Uniform response envelope shared by every endpoint
//!
//! `{ success, data?, message?, meta?, error? }`

use serde::{Deserialize, Serialize};

use crate::errors::ErrorCode;
use crate::validation::FieldError;

/// Response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Machine-readable part of a failed response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            total,
            page,
            limit,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: None,
            error: None,
        }
    }

    pub fn paginated(data: T, meta: PageMeta) -> Self {
        Self {
            meta: Some(meta),
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(message: impl Into<String>, error: ErrorBody) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            meta: None,
            error: Some(error),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            meta: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_meta_rounds_up() {
        let meta = PageMeta::new(41, 1, 20);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(PageMeta::new(0, 1, 20).total_pages, 0);
    }

    #[test]
    fn test_envelope_omits_absent_fields() {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("meta").is_none());
        assert!(json.get("error").is_none());

        let json = serde_json::to_value(ApiResponse::paginated((), PageMeta::new(5, 1, 2))).unwrap();
        assert_eq!(json["meta"]["totalPages"], 3);
    }
}
