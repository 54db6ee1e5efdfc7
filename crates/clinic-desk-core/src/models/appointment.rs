//! Appointment models.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patient::join_name;
use super::{non_blank, RecordStatus, ValidationError};

/// Placeholder shown when an appointment's patient no longer resolves.
pub const UNKNOWN_PATIENT: &str = "Unknown Patient";

/// Name columns of the referenced patient, embedded on fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PatientName {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl PatientName {
    pub fn full_name(&self) -> Option<String> {
        join_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

/// An appointment as stored in `appointments_records`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: i64,
    /// Referenced patient; nulled when the patient is deleted
    pub patient_id: Option<i64>,
    /// Local wall-clock date and time
    pub appointment_date: NaiveDateTime,
    pub appointment_type: String,
    #[serde(default)]
    pub status: RecordStatus,
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Patient lookup, `None` when the reference is dangling or null
    #[serde(default)]
    pub patient: Option<PatientName>,
}

impl Appointment {
    /// Calendar day of the appointment, ignoring time of day.
    pub fn day(&self) -> NaiveDate {
        self.appointment_date.date()
    }

    /// Name of the referenced patient, or [`UNKNOWN_PATIENT`].
    pub fn patient_label(&self) -> String {
        self.patient
            .as_ref()
            .and_then(PatientName::full_name)
            .unwrap_or_else(|| UNKNOWN_PATIENT.to_string())
    }
}

/// Insert payload for a new appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub appointment_date: NaiveDateTime,
    pub appointment_type: String,
    pub status: RecordStatus,
    pub notes: Option<String>,
}

/// Raw input of the "Add Appointment" form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentForm {
    /// Selected from the patient picker
    pub patient_id: Option<i64>,
    /// `YYYY-MM-DDTHH:MM` as produced by a datetime-local input
    pub appointment_date: String,
    pub appointment_type: String,
    pub status: RecordStatus,
    pub notes: String,
}

impl AppointmentForm {
    /// Check the form and build the insert payload.
    pub fn validate(&self) -> Result<NewAppointment, ValidationError> {
        let patient_id = self.patient_id.ok_or(ValidationError::MissingPatient)?;

        let raw_date =
            non_blank(&self.appointment_date).ok_or(ValidationError::MissingAppointmentDate)?;
        let appointment_date = parse_local_datetime(&raw_date)
            .ok_or_else(|| ValidationError::InvalidDateTime(raw_date.clone()))?;

        let appointment_type =
            non_blank(&self.appointment_type).ok_or(ValidationError::MissingAppointmentType)?;

        Ok(NewAppointment {
            patient_id,
            appointment_date,
            appointment_type,
            status: self.status,
            notes: non_blank(&self.notes),
        })
    }

    pub fn is_blank(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse a datetime-local value, with or without seconds.
pub fn parse_local_datetime(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}
