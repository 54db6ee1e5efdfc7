//! Screen composition: what each dashboard screen shows and which writes its
//! actions issue.

pub mod calendar;
mod dashboard;
pub mod notice;
mod screens;
pub mod table;

pub use calendar::{CalendarEntry, DayView};
pub use dashboard::{DashboardScreen, DashboardStats};
pub use notice::{Notice, NoticeLevel};
pub use screens::{AppointmentsScreen, PatientOption, PatientsScreen, ScreenError};
pub use table::{AppointmentRow, PatientRow, TableState};
