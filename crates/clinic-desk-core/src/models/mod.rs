//! Domain models for the clinic dashboard.

mod appointment;
mod patient;
mod status;

pub use appointment::*;
pub use patient::*;
pub use status::*;

use thiserror::Error;

/// Form validation errors, reported before anything is written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("A first or last name is required")]
    MissingName,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),

    #[error("Date of birth is in the future: {0}")]
    FutureDateOfBirth(String),

    #[error("A patient must be selected")]
    MissingPatient,

    #[error("Appointment date and time are required")]
    MissingAppointmentDate,

    #[error("Invalid date and time (expected YYYY-MM-DDTHH:MM): {0}")]
    InvalidDateTime(String),

    #[error("Appointment type is required")]
    MissingAppointmentType,
}

/// Trim a form field, mapping blank input to `None`.
pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
