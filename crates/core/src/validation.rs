//! Field-level input validation.
//!
//! Request bodies are deserialised into loosely-typed inputs (`Option<String>` and friends)
//! and checked here, so a missing or malformed field is reported by name rather than as a
//! generic decoding failure.

use crate::{CoreError, CoreResult};
use chrono::{NaiveDate, NaiveTime};
use curamind_types::{EmailAddress, NonEmptyText, TextError};
use curamind_uuid::RecordId;

/// Requires a non-blank value for `field`.
pub fn required_text(field: &str, value: Option<String>) -> CoreResult<NonEmptyText> {
    value
        .and_then(|v| NonEmptyText::new(v).ok())
        .ok_or_else(|| CoreError::validation(format!("{field} is required")))
}

/// Trims an optional value, mapping blank input to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Requires a well-formed email address for `field`.
pub fn required_email(field: &str, value: Option<String>) -> CoreResult<EmailAddress> {
    let raw = value.unwrap_or_default();
    EmailAddress::parse(&raw).map_err(|e| match e {
        TextError::Empty => CoreError::validation(format!("{field} is required")),
        TextError::InvalidEmail(_) => CoreError::validation(format!("{field} is invalid")),
    })
}

pub fn parse_id(field: &str, value: &str) -> CoreResult<RecordId> {
    RecordId::parse(value.trim())
        .map_err(|_| CoreError::validation(format!("{field} is not a valid id")))
}

pub fn required_id(field: &str, value: Option<String>) -> CoreResult<RecordId> {
    let raw = required_text(field, value)?;
    parse_id(field, raw.as_str())
}

/// Parses a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(field: &str, value: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| CoreError::validation(format!("{field} must be a date in YYYY-MM-DD form")))
}

/// Parses a 24h time of day and returns it normalised to `HH:MM`.
pub fn parse_time(field: &str, value: &str) -> CoreResult<String> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| CoreError::validation(format!("{field} must be a time in HH:MM form")))
}
