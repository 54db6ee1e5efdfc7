//! Tabular presentation of the cached lists.

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{Appointment, Patient, RecordStatus};

/// Placeholder for a missing optional value.
pub const NOT_AVAILABLE: &str = "N/A";

pub const LOADING_PATIENTS: &str = "Loading patients...";
pub const NO_PATIENTS: &str = "No patients yet. Add your first patient!";
pub const NO_MATCHING_PATIENTS: &str = "No patients found matching your search";
pub const LOADING_APPOINTMENTS: &str = "Loading appointments...";
pub const NO_APPOINTMENTS: &str = "No appointments yet. Schedule your first appointment!";

/// What a table area shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableState<R> {
    Loading(&'static str),
    /// The last fetch failed; no rows are shown.
    Failed(&'static str),
    Empty(&'static str),
    Rows(Vec<R>),
}

impl<R> TableState<R> {
    pub fn rows(&self) -> &[R] {
        match self {
            TableState::Rows(rows) => rows,
            _ => &[],
        }
    }

    /// Placeholder message, if no rows are shown.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            TableState::Loading(m) | TableState::Failed(m) | TableState::Empty(m) => Some(*m),
            TableState::Rows(_) => None,
        }
    }
}

/// "Jan 05, 2024"
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

/// "9:00 AM"
pub fn format_time(at: NaiveDateTime) -> String {
    at.format("%-I:%M %p").to_string()
}

/// "1/5/2024"
pub fn format_birth_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

fn or_na(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// One rendered patient row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRow {
    pub id: i64,
    pub medical_record_number: String,
    pub name: String,
    pub email_address: String,
    pub phone_number: String,
    pub date_of_birth: String,
    pub home_address: String,
    /// Editable in place
    pub status: RecordStatus,
}

impl From<&Patient> for PatientRow {
    fn from(p: &Patient) -> Self {
        Self {
            id: p.id,
            medical_record_number: or_na(p.medical_record_number.as_deref()),
            name: p.full_name().unwrap_or_default(),
            email_address: or_na(p.email_address.as_deref()),
            phone_number: or_na(p.phone_number.as_deref()),
            date_of_birth: p
                .date_of_birth
                .map(format_birth_date)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            home_address: or_na(p.home_address.as_deref()),
            status: p.status,
        }
    }
}

/// One rendered appointment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentRow {
    pub id: i64,
    pub patient: String,
    pub date: String,
    pub time: String,
    pub appointment_type: String,
    pub status: RecordStatus,
    pub notes: String,
}

impl From<&Appointment> for AppointmentRow {
    fn from(a: &Appointment) -> Self {
        Self {
            id: a.id,
            patient: a.patient_label(),
            date: format_date(a.day()),
            time: format_time(a.appointment_date),
            appointment_type: or_na(Some(a.appointment_type.as_str())),
            status: a.status,
            notes: or_na(a.notes.as_deref()),
        }
    }
}
