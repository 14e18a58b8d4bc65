//! Localized validation messages keyed by error code

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Language used for user-facing messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Es,
}

impl Locale {
    /// Pick the first supported language from `Accept-Language`
    pub fn from_accept_language(header: &str) -> Self {
        header
            .split(',')
            .filter_map(|part| part.split(';').next())
            .map(|tag| tag.trim().to_ascii_lowercase())
            .find_map(|tag| match tag.split('-').next() {
                Some("es") => Some(Locale::Es),
                Some("en") => Some(Locale::En),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(axum::http::header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .map(Self::from_accept_language)
            .unwrap_or_default()
    }
}

/// Headline for an aggregated validation failure
pub fn summary(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Validation failed",
        Locale::Es => "La validación ha fallado",
    }
}

/// Message for a rule code, if the catalog knows it
pub fn lookup(code: &str, locale: Locale) -> Option<&'static str> {
    let (en, es) = match code {
        "email" => ("Must be a valid email address", "Debe ser un correo electrónico válido"),
        "required" => ("This field is required", "Este campo es obligatorio"),
        "password_length" => (
            "Password must be between 8 and 50 characters",
            "La contraseña debe tener entre 8 y 50 caracteres",
        ),
        "new_password_length" => (
            "Password must be at least 6 characters",
            "La contraseña debe tener al menos 6 caracteres",
        ),
        "password_composition" => (
            "Password must contain an uppercase letter, a lowercase letter and a number",
            "La contraseña debe contener una mayúscula, una minúscula y un número",
        ),
        "password_incorrect" => (
            "Current password is incorrect",
            "La contraseña actual es incorrecta",
        ),
        "name_length" => (
            "Name must be between 2 and 100 characters",
            "El nombre debe tener entre 2 y 100 caracteres",
        ),
        "store_url" => ("Must be a valid store URL", "Debe ser una URL de tienda válida"),
        "credential_length" => (
            "Must be at least 32 characters",
            "Debe tener al menos 32 caracteres",
        ),
        "commission_range" => (
            "Commission rate must be between 0 and 100",
            "La comisión debe estar entre 0 y 100",
        ),
        "shipping_range" => (
            "Shipping cost cannot be negative",
            "El costo de envío no puede ser negativo",
        ),
        "role" => (
            "Role must be one of ADMIN, MEMBER, STOCKIST",
            "El rol debe ser ADMIN, MEMBER o STOCKIST",
        ),
        "logo_format" => (
            "Logo must be a base64 encoded PNG, JPEG, GIF, WEBP or SVG image",
            "El logo debe ser una imagen PNG, JPEG, GIF, WEBP o SVG en base64",
        ),
        "store_status" => (
            "Status must be active or inactive",
            "El estado debe ser active o inactive",
        ),
        "page_range" => (
            "Page must be between 1 and 10000",
            "La página debe estar entre 1 y 10000",
        ),
        "limit_range" => (
            "Limit must be between 1 and 100",
            "El límite debe estar entre 1 y 100",
        ),
        "sort_order" => ("Sort order must be asc or desc", "El orden debe ser asc o desc"),
        "period" => (
            "Period must be one of today, 7d, 30d, 365d, custom",
            "El periodo debe ser today, 7d, 30d, 365d o custom",
        ),
        "date_format" => (
            "Date must use the YYYY-MM-DD format",
            "La fecha debe tener el formato AAAA-MM-DD",
        ),
        "date_range" => (
            "Start date must not be after end date",
            "La fecha inicial no puede ser posterior a la final",
        ),
        "date_span" => (
            "Date range must not exceed 731 days",
            "El rango de fechas no puede superar 731 días",
        ),
        "order_status" => ("Unknown order status", "Estado de pedido desconocido"),
        "invalid_body" => ("Malformed request", "Solicitud mal formada"),
        _ => return None,
    };
    Some(match locale {
        Locale::En => en,
        Locale::Es => es,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_language_parsing() {
        assert_eq!(Locale::from_accept_language("es-MX,es;q=0.9"), Locale::Es);
        assert_eq!(Locale::from_accept_language("fr-FR, es;q=0.5"), Locale::Es);
        assert_eq!(Locale::from_accept_language("en-US"), Locale::En);
        assert_eq!(Locale::from_accept_language("de"), Locale::En);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("email", Locale::En), Some("Must be a valid email address"));
        assert!(lookup("email", Locale::Es).unwrap().contains("correo"));
        assert_eq!(lookup("no_such_rule", Locale::En), None);
    }
}
