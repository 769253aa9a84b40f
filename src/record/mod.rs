//! Domain records, insert drafts, and sparse patches.

/// Booking records and end-time derivation.
pub mod booking;
/// Client records.
pub mod client;
/// Service catalog records.
pub mod service;
/// Group-session records and derived enrollment accessors.
pub mod session;
/// Staff records and service membership.
pub mod staff;

use thiserror::Error;
use validator::ValidateEmail;

/// Field-level write rejection, surfaced with the offending field name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Name of the field that failed validation.
    pub field: &'static str,
    /// Why the value was rejected.
    pub reason: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn require_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if !value.validate_email() {
        return Err(ValidationError::new(
            field,
            format!("{value:?} is not a valid email address"),
        ));
    }
    Ok(())
}
