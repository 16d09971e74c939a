//! Input validation for API requests.
//!
//! Validation happens at the edge: a request that fails here is never
//! attempted against the store. For collecting multiple validation errors
//! and returning them as an ApiError, use the `ValidationErrorBuilder` from
//! the `error` module.

use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Permissive email shape check; deliverability is the SMTP layer's problem.
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Validate a submission date (`YYYY-MM-DD`).
pub fn validate_date(date: &str) -> Result<(), String> {
    if date.is_empty() {
        return Err("Date is required".to_string());
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| "Date must be in YYYY-MM-DD format".to_string())
}

/// Validate a wall-clock time (`HH:MM`, 24h). No timezone handling.
pub fn validate_time(field: &str, time: &str) -> Result<(), String> {
    if time.is_empty() {
        return Err(format!("{} is required", field));
    }
    NaiveTime::parse_from_str(time, "%H:%M")
        .map(|_| ())
        .map_err(|_| format!("{} must be in HH:MM format", field))
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

pub fn validate_full_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Full name is required".to_string());
    }
    if name.len() > 120 {
        return Err("Full name is too long (max 120 characters)".to_string());
    }
    Ok(())
}

pub fn validate_role(role: &str) -> Result<(), String> {
    role.parse::<crate::db::Role>().map(|_| ())
}

pub fn validate_department(department: &str) -> Result<(), String> {
    if department.len() > 80 {
        return Err("Department is too long (max 80 characters)".to_string());
    }
    Ok(())
}

pub fn validate_mode(mode: &str) -> Result<(), String> {
    if mode.len() > 40 {
        return Err("Mode is too long (max 40 characters)".to_string());
    }
    Ok(())
}

pub fn validate_remarks(remarks: &str) -> Result<(), String> {
    if remarks.len() > 2000 {
        return Err("Remarks are too long (max 2000 characters)".to_string());
    }
    Ok(())
}

/// Validate password strength for setup and reset flows.
/// Returns None if valid, or Some(error_message) if invalid.
pub fn validate_password_strength(password: &str) -> Option<String> {
    if password.len() < 10 {
        return Some("Password must be at least 10 characters".to_string());
    }

    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !has_letter || !has_digit {
        return Some("Password must contain both letters and digits".to_string());
    }

    None
}
