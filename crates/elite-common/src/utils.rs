//! Utility functions shared across crates

use chrono::NaiveDateTime;
use rand::Rng;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Current UTC time without offset, the form every stored timestamp uses
pub fn utc_now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Random string of ASCII decimal digits, used for OTP codes and account numbers
pub fn random_digits(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Canonical form used to store and look up email addresses
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Clamps 1-based paging parameters into their accepted ranges.
pub fn normalize_page(page_number: Option<u64>, page_size: Option<u64>) -> (u64, u64) {
    let page_number = page_number.filter(|p| *p > 0).unwrap_or(1);
    let page_size = page_size
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    (page_number, page_size)
}

pub fn pages_available(total_count: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(page_size)
}

/// Formats minor units as a decimal amount, e.g. `123456` -> `1234.56`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_digits() {
        let code = random_digits(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(random_digits(10).len(), 10);
        assert!(random_digits(0).is_empty());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn test_normalize_page() {
        assert_eq!(normalize_page(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(normalize_page(Some(0), Some(0)), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(normalize_page(Some(3), Some(500)), (3, MAX_PAGE_SIZE));
        assert_eq!(normalize_page(Some(2), Some(10)), (2, 10));
    }

    #[test]
    fn test_pages_available() {
        assert_eq!(pages_available(0, 20), 0);
        assert_eq!(pages_available(20, 20), 1);
        assert_eq!(pages_available(21, 20), 2);
        assert_eq!(pages_available(5, 0), 0);
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(123456), "1234.56");
        assert_eq!(format_cents(-250), "-2.50");
    }
}
