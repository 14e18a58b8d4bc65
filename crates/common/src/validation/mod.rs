//! Request validation
//!
//! Contracts derive [`validator::Validate`] and compose the pure rules in
//! [`rules`]. Every field is checked in one pass; all failures are returned
//! together as field-level messages in the caller's language, and nothing
//! downstream runs unless the whole contract passes.

pub mod messages;
pub mod rules;

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::convert::Infallible;
use validator::{Validate, ValidationErrors};

use crate::errors::{AppError, Result};
pub use messages::Locale;

/// One failed rule on one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

/// Run a contract and convert failures into a validation error
pub fn validate<T: Validate>(value: &T, locale: Locale) -> Result<()> {
    value
        .validate()
        .map_err(|errors| from_validation_errors(&errors, locale))
}

/// Flatten validator output into localized field errors
pub fn from_validation_errors(errors: &ValidationErrors, locale: Locale) -> AppError {
    let mut fields = Vec::new();

    for (field, errs) in errors.field_errors() {
        let field = to_camel_case(&field);
        for err in errs.iter() {
            let message = messages::lookup(&err.code, locale)
                .map(str::to_string)
                .or_else(|| err.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| err.code.to_string());
            fields.push(FieldError {
                field: field.clone(),
                code: err.code.to_string(),
                message,
            });
        }
    }

    fields.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.code.cmp(&b.code)));

    AppError::Validation {
        message: messages::summary(locale).to_string(),
        fields,
    }
}

/// Validation error for a single field, localized
pub fn field_error(field: &str, code: &str, locale: Locale) -> AppError {
    let message = messages::lookup(code, locale).unwrap_or(code).to_string();
    AppError::Validation {
        message: messages::summary(locale).to_string(),
        fields: vec![FieldError {
            field: field.to_string(),
            code: code.to_string(),
            message,
        }],
    }
}

fn invalid_body(detail: String, locale: Locale) -> AppError {
    AppError::Validation {
        message: messages::lookup("invalid_body", locale)
            .unwrap_or("Malformed request")
            .to_string(),
        fields: vec![FieldError {
            field: "body".to_string(),
            code: "invalid_body".to_string(),
            message: detail,
        }],
    }
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// JSON body that has passed its contract
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let locale = Locale::from_headers(req.headers());
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| invalid_body(rejection.body_text(), locale))?;
        validate(&value, locale)?;
        Ok(Self(value))
    }
}

/// Query string that has passed its contract
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let locale = Locale::from_headers(&parts.headers);
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| invalid_body(rejection.body_text(), locale))?;
        validate(&value, locale)?;
        Ok(Self(value))
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(Locale::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    #[serde(rename_all = "camelCase")]
    struct Probe {
        #[validate(email(code = "email"))]
        contact_email: String,
        #[validate(custom(function = "rules::trimmed_name"))]
        display_name: String,
    }

    #[test]
    fn test_collects_every_field() {
        let probe = Probe {
            contact_email: "nope".into(),
            display_name: " ".into(),
        };
        let err = validate(&probe, Locale::En).unwrap_err();
        match err {
            AppError::Validation { fields, .. } => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["contactEmail", "displayName"]);
                assert_eq!(fields[1].message, "Name must be between 2 and 100 characters");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_messages_follow_locale() {
        let probe = Probe {
            contact_email: "nope".into(),
            display_name: "Ana".into(),
        };
        match validate(&probe, Locale::Es).unwrap_err() {
            AppError::Validation { message, fields } => {
                assert_eq!(message, "La validación ha fallado");
                assert!(fields[0].message.contains("correo"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_camel_case("consumer_secret"), "consumerSecret");
        assert_eq!(to_camel_case("commissionRate"), "commissionRate");
    }
}
