//! Field validators for form input. Each returns the normalized value or a validation error.

use crate::error::AppError;
use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

const LETTERS: &str = "a-zA-Zа-яА-ЯёЁ";

fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static ONLY_SYMBOLS: Lazy<Regex> = Lazy::new(|| compiled(&format!("^[{}]+$", LETTERS)));
static SYMBOLS_AND_SPACES: Lazy<Regex> = Lazy::new(|| compiled(&format!(r"^[{}\s]+$", LETTERS)));
static EMAIL: Lazy<Regex> =
    Lazy::new(|| compiled(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+$"));
static RU_PHONE: Lazy<Regex> = Lazy::new(|| compiled(r"^\+7[0-9]{10}$"));
static HTML_TAG: Lazy<Regex> = Lazy::new(|| compiled(r"(?i)<\s*[a-z][\s\S]*>|</\s*[a-z][\s\S]*>"));
static TELEGRAM: Lazy<Regex> = Lazy::new(|| compiled(r"^@[0-9a-zA-Z_]+$"));
static TITLE: Lazy<Regex> = Lazy::new(|| compiled(&format!(r"^[{}0-9\s.,/\-()№:]+$", LETTERS)));
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| compiled(r"^([0-9]{4})-([0-9]{2})$"));

fn invalid<T>(msg: impl Into<String>) -> Result<T, AppError> {
    Err(AppError::validation(msg))
}

/// Apply `validate` to present values only.
pub fn skip_if_none<T, U, F>(value: Option<T>, validate: F) -> Result<Option<U>, AppError>
where
    F: FnOnce(T) -> Result<U, AppError>,
{
    value.map(validate).transpose()
}

pub fn validate_filename(filename: &str) -> Result<&str, AppError> {
    if filename.is_empty() {
        return invalid("filename is required");
    }
    Ok(filename)
}

pub fn check_not_empty(value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return invalid("field must not be empty");
    }
    Ok(trimmed.to_string())
}

/// Trimmed length in characters must lie within `[min_length, max_length]`.
pub fn check_length(value: &str, min_length: usize, max_length: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min_length {
        return invalid(format!("field must be at least {} characters", min_length));
    }
    if len > max_length {
        return invalid(format!("field must not exceed {} characters", max_length));
    }
    Ok(trimmed.to_string())
}

pub fn check_max_length_255(value: &str) -> Result<String, AppError> {
    check_length(value, 0, 255)
}

pub fn check_max_length_1000(value: &str) -> Result<String, AppError> {
    check_length(value, 0, 1000)
}

/// Latin or Cyrillic letters only. Empty passes.
pub fn check_only_symbols(value: &str) -> Result<&str, AppError> {
    if !value.is_empty() && !ONLY_SYMBOLS.is_match(value) {
        return invalid("field may contain only letters (latin/cyrillic)");
    }
    Ok(value)
}

pub fn check_only_symbols_and_spaces(value: &str) -> Result<String, AppError> {
    if !value.is_empty() && !SYMBOLS_AND_SPACES.is_match(value) {
        return invalid("field may contain only letters (latin/cyrillic) and spaces");
    }
    Ok(value.trim().to_string())
}

pub fn check_email_pattern(value: &str) -> Result<&str, AppError> {
    if !EMAIL.is_match(value) {
        return invalid("invalid email format");
    }
    Ok(value)
}

/// `+7` followed by ten digits. Empty passes.
pub fn check_russian_phone_number(value: &str) -> Result<&str, AppError> {
    if !value.is_empty() && !RU_PHONE.is_match(value) {
        return invalid("invalid phone number format, expected +7XXXXXXXXXX");
    }
    Ok(value)
}

pub fn check_no_html_scripts(value: &str) -> Result<String, AppError> {
    if HTML_TAG.is_match(value) {
        return invalid("text must not contain HTML or scripts");
    }
    Ok(value.trim().to_string())
}

/// Parse an RFC 3339 datetime; values without an offset are rejected.
pub fn check_has_timezone(value: &str) -> Result<DateTime<FixedOffset>, AppError> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Ok(dt),
        Err(_) if NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok() => {
            invalid("datetime must include a timezone")
        }
        Err(e) => invalid(format!("invalid datetime: {}", e)),
    }
}

pub fn check_integer(value: &Value) -> Result<i64, AppError> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => match n.as_i64() {
            Some(i) => Ok(i),
            None => invalid("integer is out of range"),
        },
        _ => invalid("value must be an integer"),
    }
}

pub fn check_positive_num(value: &Value) -> Result<Number, AppError> {
    let n = match value {
        Value::Number(n) => n,
        _ => return invalid("value must be a number"),
    };
    if n.as_f64().map(|f| f <= 0.0).unwrap_or(true) {
        return invalid("value must be greater than zero");
    }
    Ok(n.clone())
}

pub fn check_no_double_spaces(value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.contains("  ") {
        return invalid("text must not contain consecutive spaces");
    }
    Ok(trimmed.to_string())
}

/// Blank becomes `None`; anything else is trimmed.
pub fn check_empty_to_none(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// True when the string contains any whitespace, visible or not.
pub fn check_hidden_or_spaces(value: &str) -> bool {
    value.chars().any(char::is_whitespace)
}

pub fn parse_year_month_strict(value: &str) -> Result<NaiveDate, AppError> {
    parse_year_month_strict_at(value, Local::now().date_naive())
}

/// `YYYY-MM` to the first day of that month. Months after `today`'s are rejected.
pub fn parse_year_month_strict_at(value: &str, today: NaiveDate) -> Result<NaiveDate, AppError> {
    let caps = match YEAR_MONTH.captures(value) {
        Some(c) => c,
        None => return invalid("expected format YYYY-MM"),
    };
    let year: i32 = caps[1].parse().map_err(|_| AppError::validation("invalid year"))?;
    let month: u32 = caps[2].parse().map_err(|_| AppError::validation("invalid month"))?;
    if !(1..=12).contains(&month) {
        return invalid("month must be between 01 and 12");
    }
    if year < 1900 {
        return invalid("year must not be before 1900");
    }
    if (year, month) > (today.year(), today.month()) {
        return invalid("date must not be in the future");
    }
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| AppError::validation("invalid date"))
}

pub fn validate_graduation_year(value: i32) -> Result<i32, AppError> {
    validate_graduation_year_at(value, Local::now().date_naive())
}

pub fn validate_graduation_year_at(value: i32, today: NaiveDate) -> Result<i32, AppError> {
    if value < 1900 {
        return invalid("graduation year must not be before 1900");
    }
    if value > today.year() {
        return invalid("graduation year must not be in the future");
    }
    Ok(value)
}

pub fn validate_birth_date(birthday: NaiveDate) -> Result<NaiveDate, AppError> {
    validate_birth_date_at(birthday, Local::now().date_naive())
}

/// Not in the future and at least 16 full years before `today`.
pub fn validate_birth_date_at(
    birthday: NaiveDate,
    today: NaiveDate,
) -> Result<NaiveDate, AppError> {
    if birthday > today {
        return invalid("birth date must not be in the future");
    }
    let before_birthday = (today.month(), today.day()) < (birthday.month(), birthday.day());
    let age = today.year() - birthday.year() - i32::from(before_birthday);
    if age < 16 {
        return invalid("age must be at least 16");
    }
    Ok(birthday)
}

/// `@` plus letters, digits or underscores; 5 to 32 characters in total. Empty passes.
pub fn validate_telegram_nickname(value: &str) -> Result<&str, AppError> {
    if value.is_empty() {
        return Ok(value);
    }
    let len = value.chars().count();
    if len < 5 {
        return invalid("telegram nickname must be at least 5 characters");
    }
    if len > 32 {
        return invalid("telegram nickname must not exceed 32 characters");
    }
    if !TELEGRAM.is_match(value) {
        return invalid(
            "telegram nickname must start with @ and contain only letters, digits and underscores",
        );
    }
    Ok(value)
}

pub fn validate_title_symbols(value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if !TITLE.is_match(trimmed) {
        return invalid(
            "title may contain only letters (latin/cyrillic), digits, spaces and [. , / - ( ) № :]",
        );
    }
    Ok(trimmed.to_string())
}

pub fn check_symbols_numeric_spaces_special_char(value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if !TITLE.is_match(trimmed) {
        return invalid("field may contain only letters, digits, spaces and [. , / - ( ) № :]");
    }
    Ok(trimmed.to_string())
}
