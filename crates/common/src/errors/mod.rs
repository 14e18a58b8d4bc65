//! Error types for ShopBoard services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Responses rendered in the uniform API envelope
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::{ApiResponse, ErrorBody};
use crate::validation::FieldError;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidCredentials,
    InvalidToken,
    ExpiredToken,

    // Authorization errors (3xxx)
    Forbidden,

    // Resource errors (4xxx)
    NotFound,

    // Conflict errors (5xxx)
    Conflict,

    // Rate limiting and quotas (6xxx)
    RateLimited,
    QuotaExceeded,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    UpstreamError,
    StoreApiError,
    CacheError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidCredentials => 2002,
            ErrorCode::InvalidToken => 2003,
            ErrorCode::ExpiredToken => 2004,

            ErrorCode::Forbidden => 3001,

            ErrorCode::NotFound => 4001,

            ErrorCode::Conflict => 5001,

            ErrorCode::RateLimited => 6001,
            ErrorCode::QuotaExceeded => 6002,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::StoreApiError => 8002,
            ErrorCode::CacheError => 8003,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Conflict errors
    #[error("Conflict: {message}")]
    Conflict { message: String },

    // Rate limiting and quotas
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    #[error("Store limit reached: plan {plan} allows {limit} stores")]
    QuotaExceeded {
        plan: String,
        limit: u32,
        current: u64,
    },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Store API error: {message}")]
    StoreApi {
        message: String,
        status: Option<u16>,
    },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a single-field validation failure
    pub fn field(field: &str, code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            message: "Validation failed".to_string(),
            fields: vec![FieldError {
                field: field.to_string(),
                code: code.to_string(),
                message,
            }],
        }
    }

    /// Shorthand for a missing resource
    pub fn not_found(resource_type: &str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::InvalidToken => ErrorCode::InvalidToken,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::Conflict { .. } => ErrorCode::Conflict,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::StoreApi { .. } => ErrorCode::StoreApiError,
            AppError::CacheError { .. } => ErrorCode::CacheError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. }
            | AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 402 Payment Required: the client offers an upgrade path
            AppError::QuotaExceeded { .. } => StatusCode::PAYMENT_REQUIRED,

            // 403 Forbidden
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict { .. } => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::StoreApi { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::CacheError { .. } | AppError::ServiceUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    fn body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            code: self.code(),
            fields: None,
            details: None,
        };
        match self {
            AppError::Validation { fields, .. } if !fields.is_empty() => {
                body.fields = Some(fields.clone());
            }
            AppError::QuotaExceeded {
                plan,
                limit,
                current,
            } => {
                body.details = Some(serde_json::json!({
                    "plan": plan,
                    "limit": limit,
                    "current": current,
                }));
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Internal failure details stay in the logs
        let message = if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
            match &self {
                AppError::StoreApi { .. } => self.to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
            self.to_string()
        };

        let body: ApiResponse<()> = ApiResponse::failure(message, self.body());

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::not_found("store", "abc");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code().as_code(), 4001);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::field("name", "name_length", "Too short");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());

        let body = err.body();
        let fields = body.fields.expect("field list");
        assert_eq!(fields[0].field, "name");
    }

    #[test]
    fn test_quota_error_is_distinct_from_validation() {
        let err = AppError::QuotaExceeded {
            plan: "FREE".into(),
            limit: 2,
            current: 2,
        };
        assert_eq!(err.code(), ErrorCode::QuotaExceeded);
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_ne!(err.code(), ErrorCode::ValidationError);

        let details = err.body().details.expect("quota details");
        assert_eq!(details["limit"], 2);
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
