//! Field rules used by the request contracts
//!
//! Each rule is a pure function returning the rule code on failure; messages
//! are resolved from the catalog when errors are collected.

use regex_lite::Regex;
use std::sync::LazyLock;
use validator::ValidationError;

use crate::auth::Role;

/// `[http[s]://]host[:port][/path]`
static STORE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)*[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?::\d{1,5})?(?:/\S*)?$")
        .expect("store url pattern compiles")
});

static LOGO_DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/(?:png|jpeg|jpg|gif|webp|svg\+xml);base64,")
        .expect("logo pattern compiles")
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"));

pub const STORE_STATUSES: [&str; 2] = ["active", "inactive"];
pub const SORT_ORDERS: [&str; 2] = ["asc", "desc"];
pub const PERIODS: [&str; 5] = ["today", "7d", "30d", "365d", "custom"];

fn fail(code: &'static str) -> Result<(), ValidationError> {
    Err(ValidationError::new(code))
}

/// At least one lowercase letter, one uppercase letter and one digit
pub fn password_composition(value: &str) -> Result<(), ValidationError> {
    let lower = value.chars().any(|c| c.is_ascii_lowercase());
    let upper = value.chars().any(|c| c.is_ascii_uppercase());
    let digit = value.chars().any(|c| c.is_ascii_digit());
    if lower && upper && digit {
        Ok(())
    } else {
        fail("password_composition")
    }
}

/// Trimmed length between 2 and 100 characters
pub fn trimmed_name(value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if (2..=100).contains(&len) {
        Ok(())
    } else {
        fail("name_length")
    }
}

pub fn store_url(value: &str) -> Result<(), ValidationError> {
    if STORE_URL.is_match(value.trim()) {
        Ok(())
    } else {
        fail("store_url")
    }
}

pub fn logo_data_url(value: &str) -> Result<(), ValidationError> {
    if LOGO_DATA_URL.is_match(value) {
        Ok(())
    } else {
        fail("logo_format")
    }
}

pub fn member_role(value: &str) -> Result<(), ValidationError> {
    match value.parse::<Role>() {
        Ok(_) => Ok(()),
        Err(_) => fail("role"),
    }
}

pub fn store_status(value: &str) -> Result<(), ValidationError> {
    if STORE_STATUSES.contains(&value) {
        Ok(())
    } else {
        fail("store_status")
    }
}

pub fn sort_order(value: &str) -> Result<(), ValidationError> {
    if SORT_ORDERS.contains(&value) {
        Ok(())
    } else {
        fail("sort_order")
    }
}

pub fn period(value: &str) -> Result<(), ValidationError> {
    if PERIODS.contains(&value) {
        Ok(())
    } else {
        fail("period")
    }
}

/// Calendar date in `YYYY-MM-DD`
pub fn iso_date(value: &str) -> Result<(), ValidationError> {
    let valid = ISO_DATE.is_match(value)
        && chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
    if valid {
        Ok(())
    } else {
        fail("date_format")
    }
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        fail("required")
    } else {
        Ok(())
    }
}
