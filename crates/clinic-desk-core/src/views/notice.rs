//! User-visible notifications.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A toast shown after an action or a background failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: "Success".into(),
            description: description.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: "Error".into(),
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

pub const STATUS_UPDATED: &str = "Status updated successfully";
pub const STATUS_UPDATE_FAILED: &str = "Failed to update status";

pub const PATIENTS_FETCH_FAILED: &str = "Failed to fetch patients";
pub const PATIENT_ADDED: &str = "Patient added successfully";
pub const PATIENT_ADD_FAILED: &str = "Failed to add patient";
pub const PATIENT_DELETED: &str = "Patient deleted successfully";
pub const PATIENT_DELETE_FAILED: &str = "Failed to delete patient";

pub const APPOINTMENTS_FETCH_FAILED: &str = "Failed to fetch appointments";
pub const APPOINTMENT_ADDED: &str = "Appointment added successfully";
pub const APPOINTMENT_ADD_FAILED: &str = "Failed to add appointment";
pub const APPOINTMENT_DELETED: &str = "Appointment deleted successfully";
pub const APPOINTMENT_DELETE_FAILED: &str = "Failed to delete appointment";

pub const STATS_FETCH_FAILED: &str = "Failed to fetch dashboard statistics";
