//! Calendar presentation of appointments.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::table::format_time;
use crate::models::{Appointment, RecordStatus};

pub const LOADING_CALENDAR: &str = "Loading calendar...";
pub const NO_APPOINTMENTS_ON_DAY: &str = "No appointments scheduled for this date";

/// Days holding at least one appointment, for marking in the date picker.
pub fn days_with_appointments(appointments: &[Appointment]) -> BTreeSet<NaiveDate> {
    appointments.iter().map(Appointment::day).collect()
}

/// Appointments on `day`, ignoring time of day, ordered by time.
pub fn appointments_on(appointments: &[Appointment], day: NaiveDate) -> Vec<&Appointment> {
    let mut on_day: Vec<&Appointment> = appointments.iter().filter(|a| a.day() == day).collect();
    // Stable, so equal times keep list order
    on_day.sort_by_key(|a| a.appointment_date);
    on_day
}

/// "Appointments for January 05, 2024"
pub fn heading(day: NaiveDate) -> String {
    format!("Appointments for {}", day.format("%B %d, %Y"))
}

/// One appointment in the selected-day list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub id: i64,
    pub time: String,
    pub patient: String,
    pub appointment_type: String,
    pub status: RecordStatus,
    pub notes: Option<String>,
}

impl From<&Appointment> for CalendarEntry {
    fn from(a: &Appointment) -> Self {
        Self {
            id: a.id,
            time: format_time(a.appointment_date),
            patient: a.patient_label(),
            appointment_type: a.appointment_type.clone(),
            status: a.status,
            notes: a.notes.clone(),
        }
    }
}

/// The selected day's panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayView {
    pub day: NaiveDate,
    pub heading: String,
    pub entries: Vec<CalendarEntry>,
    /// Placeholder when there is nothing to list
    pub message: Option<&'static str>,
}

impl DayView {
    pub fn build(appointments: &[Appointment], day: NaiveDate, loading: bool) -> Self {
        if loading {
            return Self {
                day,
                heading: heading(day),
                entries: Vec::new(),
                message: Some(LOADING_CALENDAR),
            };
        }
        let entries: Vec<CalendarEntry> = appointments_on(appointments, day)
            .into_iter()
            .map(CalendarEntry::from)
            .collect();
        let message = entries.is_empty().then_some(NO_APPOINTMENTS_ON_DAY);
        Self {
            day,
            heading: heading(day),
            entries,
            message,
        }
    }
}
