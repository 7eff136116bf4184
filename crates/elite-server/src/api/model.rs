// Common API request models

use chrono::{NaiveDate, NaiveDateTime};
use elite_common::{EliteError, utils::normalize_page};
use serde::Deserialize;

/// `page` / `page_size` query parameters, 1-based.
///
/// Query structs with more filters repeat these two fields instead of
/// flattening this one; url-encoded values do not survive `serde(flatten)`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageParams {
    pub fn normalized(&self) -> (u64, u64) {
        normalize_page(self.page, self.page_size)
    }
}

/// `{email, code}` body of the OTP confirmation endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct EmailCode {
    pub email: String,
    pub code: String,
}

/// `{email}` body of the recovery endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct EmailOnly {
    pub email: String,
}

/// Parses an RFC 3339 timestamp or a `YYYY-MM-DD` date.
///
/// A bare date is the start of that day, or the end of it when `end_of_day`
/// is set, so date ranges include their last day.
pub fn parse_date_bound(
    field: &str,
    value: Option<&str>,
    end_of_day: bool,
) -> Result<Option<NaiveDateTime>, EliteError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(Some(ts.naive_utc()));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Some(ts));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        return Ok(time);
    }

    Err(EliteError::IllegalArgument(format!(
        "Invalid {} format. Use ISO format (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)",
        field
    )))
}

/// Parses an optional enum query parameter, reporting the offending field
pub fn parse_filter<T: std::str::FromStr>(field: &str, value: Option<&str>) -> Result<Option<T>, EliteError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| EliteError::IllegalArgument(format!("Invalid {}: {}", field, v))),
    }
}

#[cfg(test)]
mod tests {
    use elite_persistence::TransactionStatus;

    use super::*;

    #[test]
    fn test_page_params_defaults() {
        assert_eq!(PageParams::default().normalized(), (1, 20));
        let params = PageParams {
            page: Some(3),
            page_size: Some(500),
        };
        assert_eq!(params.normalized(), (3, 100));
    }

    #[test]
    fn test_parse_date_bound() {
        let start = parse_date_bound("start_date", Some("2024-03-01"), false).unwrap();
        assert_eq!(start.unwrap().to_string(), "2024-03-01 00:00:00");

        let end = parse_date_bound("end_date", Some("2024-03-01"), true).unwrap();
        assert_eq!(end.unwrap().to_string(), "2024-03-01 23:59:59");

        let ts = parse_date_bound("start_date", Some("2024-03-01T10:00:00+01:00"), false).unwrap();
        assert_eq!(ts.unwrap().to_string(), "2024-03-01 09:00:00");

        assert!(parse_date_bound("start_date", None, false).unwrap().is_none());
        assert!(parse_date_bound("start_date", Some("01/03/2024"), false).is_err());
    }

    #[test]
    fn test_parse_filter() {
        let status: Option<TransactionStatus> = parse_filter("status", Some("pending")).unwrap();
        assert_eq!(status, Some(TransactionStatus::Pending));
        assert!(parse_filter::<TransactionStatus>("status", Some("done")).is_err());
        assert!(parse_filter::<TransactionStatus>("status", Some("")).unwrap().is_none());
    }
}
