// Core lending workflow
pub mod lending;
pub mod reports;

// Catalog and reference data
pub mod categories;
pub mod damage_reports;
pub mod items;
pub mod projects;
pub mod users;
pub mod warranties;

// Cross-cutting
pub mod audit;

use chrono::NaiveDate;
use sea_orm::{DbErr, SqlErr};

use crate::errors::ServiceError;

/// Parses an ISO `YYYY-MM-DD` date, naming the offending field on failure.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ServiceError::InvalidInput(format!(
            "Invalid {} '{}': expected YYYY-MM-DD",
            field, value
        ))
    })
}

pub fn parse_optional_date(
    field: &str,
    value: Option<&str>,
) -> Result<Option<NaiveDate>, ServiceError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(field, v).map(Some),
        None => Ok(None),
    }
}

/// Inclusive date window used by the listing and report filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, ServiceError> {
        let range = Self {
            start: parse_optional_date("start_date", start)?,
            end: parse_optional_date("end_date", end)?,
        };
        if let (Some(s), Some(e)) = (range.start, range.end) {
            if s > e {
                return Err(ServiceError::InvalidInput(format!(
                    "start_date {} is after end_date {}",
                    s, e
                )));
            }
        }
        Ok(range)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Zero-based page index for sea-orm paginators from a one-based page number.
pub(crate) fn page_index(page: u64) -> u64 {
    page.max(1) - 1
}

/// Maps a unique-constraint violation to `Conflict`, anything else to a storage failure.
pub(crate) fn map_unique_violation(err: DbErr, conflict_message: impl Into<String>) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(conflict_message.into()),
        _ => ServiceError::db_error(err),
    }
}

pub(crate) fn require_non_blank(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_date("borrow_date", "2024-03-09").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
        );
        assert_matches!(
            parse_date("borrow_date", "09/03/2024"),
            Err(ServiceError::InvalidInput(msg)) if msg.contains("borrow_date")
        );
        assert_matches!(parse_date("due_date", "2024-02-30"), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn blank_optional_dates_are_absent() {
        assert_eq!(parse_optional_date("start_date", Some("  ")).unwrap(), None);
        assert_eq!(parse_optional_date("start_date", None).unwrap(), None);
    }

    #[test]
    fn date_range_rejects_inverted_bounds() {
        assert_matches!(
            DateRange::parse(Some("2024-05-01"), Some("2024-04-01")),
            Err(ServiceError::InvalidInput(_))
        );
        let range = DateRange::parse(Some("2024-04-01"), Some("2024-04-30")).unwrap();
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()));
        assert!(DateRange::default().contains(NaiveDate::MIN));
    }

    #[test]
    fn page_index_is_zero_based() {
        assert_eq!(page_index(0), 0);
        assert_eq!(page_index(1), 0);
        assert_eq!(page_index(3), 2);
    }
}
