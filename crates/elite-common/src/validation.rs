//! Input validation helpers
//!
//! Free functions in the `validator` style so they can be used both directly and
//! through `#[validate(custom(function = ...))]` on request payloads.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use validator::{ValidateEmail, ValidationError, ValidationErrors};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const PIN_LENGTH: usize = 6;
pub const MIN_AGE: i32 = 18;
pub const MAX_AGE: i32 = 120;

/// Languages a user may pick as their preference
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "fr", "es", "de", "zh", "ar", "pt", "yo", "ha", "ig"];

static POSTAL_CODE_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^[A-Z0-9\s-]{3,10}$").expect("Invalid regex pattern")
});

static PHONE_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\+?[0-9][0-9 -]{6,19}$").expect("Invalid regex pattern"));

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.validate_email() {
        Ok(())
    } else {
        Err(error("email_invalid", "invalid email address"))
    }
}

/// At least 8 characters with an uppercase letter, a lowercase letter, and a digit
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(error(
            "password_too_short",
            "password must be at least 8 characters long",
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(error("password_too_long", "password is too long"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(error(
            "password_no_uppercase",
            "password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(error(
            "password_no_lowercase",
            "password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(error(
            "password_no_digit",
            "password must contain at least one digit",
        ));
    }
    Ok(())
}

pub fn validate_pin(pin: &str) -> Result<(), ValidationError> {
    if pin.len() != PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(error("pin_invalid", "PIN must be exactly 6 digits"));
    }
    Ok(())
}

pub fn validate_otp_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(error("otp_invalid", "OTP code must be 6 digits"));
    }
    Ok(())
}

pub fn validate_postal_code(postal_code: &str) -> Result<(), ValidationError> {
    if POSTAL_CODE_PATTERN.is_match(postal_code.trim()) {
        Ok(())
    } else {
        Err(error("postal_code_invalid", "invalid postal code format"))
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_PATTERN.is_match(phone.trim()) {
        Ok(())
    } else {
        Err(error("phone_invalid", "invalid phone number"))
    }
}

/// ISO-4217 style: three ASCII letters
pub fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(error("currency_invalid", "currency must be a 3-letter code"))
    }
}

pub fn validate_language(language: &str) -> Result<(), ValidationError> {
    if SUPPORTED_LANGUAGES.contains(&language) {
        Ok(())
    } else {
        Err(error("language_unsupported", "unsupported language"))
    }
}

/// Parses a `YYYY-MM-DD` birth date and checks the holder is between 18 and 120
/// years old on `today`.
pub fn validate_date_of_birth(value: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let dob = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        error(
            "date_of_birth_format",
            "invalid date format, use YYYY-MM-DD",
        )
    })?;

    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }

    if age < MIN_AGE {
        return Err(error(
            "date_of_birth_underage",
            "you must be at least 18 years old",
        ));
    }
    if age > MAX_AGE {
        return Err(error("date_of_birth_invalid", "invalid date of birth"));
    }
    Ok(dob)
}

/// Flattens validator errors into human readable messages, sorted by field.
pub fn collect_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let mut messages = Vec::new();
    for (field, errs) in fields {
        for err in errs.iter() {
            match &err.message {
                Some(message) => messages.push(format!("{}: {}", field, message)),
                None => messages.push(format!("{}: {}", field, err.code)),
            }
        }
    }
    messages
}

/// Message of a single validation error, falling back to its code
pub fn message_of(err: &ValidationError) -> String {
    err.message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| err.code.to_string())
}
