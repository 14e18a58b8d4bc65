//! Query-string contracts: pagination and date ranges

use chrono::{Days, NaiveDate, NaiveTime, DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::constants::{OrderStatus, DEFAULT_PAGE_SIZE, MAX_PAGE, MAX_PAGE_SIZE, MAX_REPORT_SPAN_DAYS};
use crate::errors::Result;
use crate::validation::{field_error, rules, Locale};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Resolved pagination parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort_by: None,
            sort_order: SortOrder::default(),
        }
    }
}

fn pagination(
    page: Option<u64>,
    limit: Option<u64>,
    sort_by: &Option<String>,
    sort_order: &Option<String>,
) -> Pagination {
    Pagination {
        page: page.unwrap_or(1).clamp(1, MAX_PAGE),
        limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        sort_by: sort_by.clone(),
        sort_order: match sort_order.as_deref() {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        },
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    #[validate(range(min = 1, max = 10_000, code = "page_range"))]
    pub page: Option<u64>,

    #[validate(range(min = 1, max = 100, code = "limit_range"))]
    pub limit: Option<u64>,

    pub sort_by: Option<String>,

    #[validate(custom(function = "rules::sort_order"))]
    pub sort_order: Option<String>,
}

impl PaginationQuery {
    pub fn resolve(&self) -> Pagination {
        pagination(self.page, self.limit, &self.sort_by, &self.sort_order)
    }
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// First instant of the range
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// First instant after the range
    pub fn ends_before(&self) -> DateTime<Utc> {
        self.end
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end)
            .and_time(NaiveTime::MIN)
            .and_utc()
    }

    /// Number of calendar days covered
    pub fn days(&self) -> u64 {
        u64::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }

    fn trailing(today: NaiveDate, days: u64) -> Self {
        Self {
            start: today.checked_sub_days(Days::new(days - 1)).unwrap_or(today),
            end: today,
        }
    }
}

/// Report query: optional store filter, date window and pagination
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub store_id: Option<Uuid>,

    #[validate(custom(function = "rules::iso_date"))]
    pub start_date: Option<String>,

    #[validate(custom(function = "rules::iso_date"))]
    pub end_date: Option<String>,

    #[validate(custom(function = "rules::period"))]
    pub period: Option<String>,

    #[validate(custom(function = "order_status"))]
    pub status: Option<String>,

    #[validate(range(min = 1, max = 10_000, code = "page_range"))]
    pub page: Option<u64>,

    #[validate(range(min = 1, max = 100, code = "limit_range"))]
    pub limit: Option<u64>,

    pub sort_by: Option<String>,

    #[validate(custom(function = "rules::sort_order"))]
    pub sort_order: Option<String>,
}

fn order_status(value: &str) -> std::result::Result<(), validator::ValidationError> {
    value
        .parse::<OrderStatus>()
        .map(|_| ())
        .map_err(|_| validator::ValidationError::new("order_status"))
}

impl ReportQuery {
    pub fn pagination(&self) -> Pagination {
        pagination(self.page, self.limit, &self.sort_by, &self.sort_order)
    }

    pub fn status(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// Resolve the requested window against `today`
    ///
    /// Without a period, explicit dates form a custom range and no input at
    /// all means the last 30 days.
    pub fn date_range(&self, today: NaiveDate, locale: Locale) -> Result<DateRange> {
        let parse = |value: &Option<String>, field: &str| -> Result<Option<NaiveDate>> {
            value
                .as_deref()
                .map(|v| {
                    NaiveDate::parse_from_str(v, "%Y-%m-%d")
                        .map_err(|_| field_error(field, "date_format", locale))
                })
                .transpose()
        };
        let start = parse(&self.start_date, "startDate")?;
        let end = parse(&self.end_date, "endDate")?;

        let range = match (self.period.as_deref(), start, end) {
            (Some("today"), _, _) => DateRange::trailing(today, 1),
            (Some("7d"), _, _) => DateRange::trailing(today, 7),
            (Some("30d"), _, _) => DateRange::trailing(today, 30),
            (Some("365d"), _, _) => DateRange::trailing(today, 365),
            (Some(_), None, _) => return Err(field_error("startDate", "required", locale)),
            (Some(_), Some(_), None) => return Err(field_error("endDate", "required", locale)),
            (Some(_), Some(start), Some(end)) | (None, Some(start), Some(end)) => {
                DateRange { start, end }
            }
            (None, Some(start), None) => DateRange { start, end: today },
            (None, None, Some(_)) => return Err(field_error("startDate", "required", locale)),
            (None, None, None) => DateRange::trailing(today, 30),
        };

        if range.start > range.end {
            return Err(field_error("startDate", "date_range", locale));
        }
        if range.days() > MAX_REPORT_SPAN_DAYS {
            return Err(field_error("endDate", "date_span", locale));
        }
        Ok(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_pagination_defaults() {
        let query = PaginationQuery::default();
        assert!(query.validate().is_ok());
        let resolved = query.resolve();
        assert_eq!(resolved.page, 1);
        assert_eq!(resolved.limit, 20);
        assert_eq!(resolved.offset(), 0);
        assert_eq!(resolved.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_pagination_limit_bounds() {
        let over = PaginationQuery {
            limit: Some(101),
            ..Default::default()
        };
        assert!(over.validate().is_err());
        let max = PaginationQuery {
            limit: Some(100),
            page: Some(3),
            sort_order: Some("asc".into()),
            ..Default::default()
        };
        assert!(max.validate().is_ok());
        assert_eq!(max.resolve().offset(), 200);
        assert_eq!(max.resolve().sort_order, SortOrder::Asc);

        let sideways = PaginationQuery {
            sort_order: Some("up".into()),
            ..Default::default()
        };
        assert!(sideways.validate().is_err());
    }

    #[test]
    fn test_page_is_bounded() {
        let huge = ReportQuery {
            page: Some(u64::MAX),
            ..Default::default()
        };
        let errors = huge.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("page"));

        let last = PaginationQuery {
            page: Some(MAX_PAGE),
            limit: Some(MAX_PAGE_SIZE),
            ..Default::default()
        };
        assert!(last.validate().is_ok());
        assert_eq!(last.resolve().offset(), (MAX_PAGE - 1) * MAX_PAGE_SIZE);

        // Unvalidated input still cannot overflow the offset
        let resolved = huge.pagination();
        assert_eq!(resolved.page, MAX_PAGE);
        let raw = Pagination {
            page: u64::MAX,
            limit: MAX_PAGE_SIZE,
            ..Default::default()
        };
        assert_eq!(raw.offset(), u64::MAX);
    }

    #[test]
    fn test_custom_range_span_is_capped() {
        let today = day("2024-03-10");
        let query = |start: &str, end: &str| ReportQuery {
            start_date: Some(start.into()),
            end_date: Some(end.into()),
            ..Default::default()
        };

        let widest = query("2022-01-01", "2024-01-01");
        assert_eq!(widest.date_range(today, Locale::En).unwrap().days(), MAX_REPORT_SPAN_DAYS);
        assert!(query("2021-12-31", "2024-01-01").date_range(today, Locale::En).is_err());
        assert!(query("0001-01-01", "9999-12-31").date_range(today, Locale::En).is_err());

        let year = ReportQuery {
            period: Some("365d".into()),
            ..Default::default()
        };
        assert_eq!(year.date_range(today, Locale::En).unwrap().days(), 365);
    }

    #[test]
    fn test_period_tokens() {
        let today = day("2024-03-10");
        let query = |period: &str| ReportQuery {
            period: Some(period.into()),
            ..Default::default()
        };

        assert_eq!(
            query("today").date_range(today, Locale::En).unwrap(),
            DateRange { start: today, end: today }
        );
        assert_eq!(query("7d").date_range(today, Locale::En).unwrap().start, day("2024-03-04"));
        assert_eq!(query("30d").date_range(today, Locale::En).unwrap().start, day("2024-02-10"));
        assert!(query("90d").validate().is_err());
    }

    #[test]
    fn test_custom_range_requires_both_dates() {
        let today = day("2024-03-10");
        let partial = ReportQuery {
            period: Some("custom".into()),
            start_date: Some("2024-01-01".into()),
            ..Default::default()
        };
        assert!(partial.date_range(today, Locale::En).is_err());

        let full = ReportQuery {
            period: Some("custom".into()),
            start_date: Some("2024-01-01".into()),
            end_date: Some("2024-01-31".into()),
            ..Default::default()
        };
        let range = full.date_range(today, Locale::En).unwrap();
        assert_eq!(range.start, day("2024-01-01"));
        assert_eq!(range.ends_before().date_naive(), day("2024-02-01"));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let query = ReportQuery {
            start_date: Some("2024-02-01".into()),
            end_date: Some("2024-01-01".into()),
            ..Default::default()
        };
        assert!(query.date_range(day("2024-03-10"), Locale::En).is_err());
    }

    #[test]
    fn test_default_window_is_thirty_days() {
        let range = ReportQuery::default()
            .date_range(day("2024-03-10"), Locale::En)
            .unwrap();
        assert_eq!(range.start, day("2024-02-10"));
        assert_eq!(range.end, day("2024-03-10"));
    }

    #[test]
    fn test_order_status_filter() {
        let query = ReportQuery {
            status: Some("on-hold".into()),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
        assert_eq!(query.status(), Some(OrderStatus::OnHold));

        let bad = ReportQuery {
            status: Some("shipped".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
