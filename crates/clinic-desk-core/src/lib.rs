//! Clinic Desk Core Library
//!
//! Patient records and appointment scheduling for a clinic administration
//! dashboard.
//!
//! # Architecture
//!
//! ```text
//!   Screen (mount / user action)
//!        │                       ▲
//!        ▼                       │ rows, notices
//!   OptimisticMutator ──────► EntityStore ◄──── changefeed events
//!        │                       │                    ▲
//!        ▼                       ▼                    │
//!   ┌──────────────────── DataGateway ────────────────┘
//!   │  select / count / insert / update / delete / subscribe
//!   └──────────────────────────┬──────────────────────────
//!                              ▼
//!            patients_records, appointments_records
//! ```
//!
//! # Core Principle
//!
//! **A failure ends the action that caused it, never the screen.** Every
//! backend error becomes one notice; optimistic edits that fail are undone by
//! re-fetching what the backend holds.
//!
//! # Modules
//!
//! - [`db`]: SQLite tables and column-generic row operations
//! - [`query`]: Filters, ordering and embedded lookups
//! - [`gateway`]: Backend API, changefeed and typed entity access
//! - [`store`]: Per-screen cached lists with two-phase refresh
//! - [`mutator`]: Optimistic status changes, deletes, creation forms
//! - [`search`]: Patient search filter
//! - [`views`]: Patients, appointments and dashboard screens
//! - [`session`], [`config`], [`logging`]: Ambient setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod mutator;
pub mod query;
pub mod search;
pub mod session;
pub mod store;
pub mod views;

// Re-export commonly used types
pub use config::DeskConfig;
pub use db::Database;
pub use gateway::{DataGateway, EntityGateway, SqliteGateway};
pub use models::{Appointment, AppointmentForm, Patient, PatientForm, RecordStatus};
pub use search::SearchFilter;
pub use session::{AuthContext, Session};
pub use store::{EntityStore, StaleResponsePolicy};
pub use views::{AppointmentsScreen, DashboardScreen, Notice, PatientsScreen};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use views::{AppointmentRow, DayView, NoticeLevel, PatientOption, PatientRow, TableState};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicDeskError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication required")]
    AuthMissing,
}

impl From<db::DbError> for ClinicDeskError {
    fn from(e: db::DbError) -> Self {
        ClinicDeskError::DatabaseError(e.to_string())
    }
}

impl From<gateway::GatewayError> for ClinicDeskError {
    fn from(e: gateway::GatewayError) -> Self {
        match e {
            gateway::GatewayError::NotFound { .. } => ClinicDeskError::NotFound(e.to_string()),
            other => ClinicDeskError::DatabaseError(other.to_string()),
        }
    }
}

impl From<models::ValidationError> for ClinicDeskError {
    fn from(e: models::ValidationError) -> Self {
        ClinicDeskError::InvalidInput(e.to_string())
    }
}

impl From<config::ConfigError> for ClinicDeskError {
    fn from(e: config::ConfigError) -> Self {
        ClinicDeskError::ConfigError(e.to_string())
    }
}

impl From<views::ScreenError> for ClinicDeskError {
    fn from(e: views::ScreenError) -> Self {
        match e {
            views::ScreenError::AuthMissing => ClinicDeskError::AuthMissing,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicDeskError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicDeskError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<ClinicDesk>, ClinicDeskError> {
    let gateway = SqliteGateway::open(&path)?;
    Ok(ClinicDesk::new(gateway, StaleResponsePolicy::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ClinicDesk>, ClinicDeskError> {
    let gateway = SqliteGateway::open_in_memory()?;
    Ok(ClinicDesk::new(gateway, StaleResponsePolicy::default()))
}

/// Open the database described by a TOML config file and install logging.
#[uniffi::export]
pub fn open_with_config(config_path: String) -> Result<Arc<ClinicDesk>, ClinicDeskError> {
    let config = DeskConfig::load(&config_path)?;
    if logging::init_logging(&config.logging).is_err() {
        debug!("global subscriber already installed");
    }
    let gateway = match &config.database.path {
        Some(path) => SqliteGateway::open(path)?,
        None => SqliteGateway::open_in_memory()?,
    };
    Ok(ClinicDesk::new(gateway, config.sync.stale_responses))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn auth_context(session: Option<FfiSession>) -> Result<AuthContext, ClinicDeskError> {
    match session {
        Some(s) => Ok(AuthContext::signed_in(s.try_into()?)),
        None => Ok(AuthContext::signed_out()),
    }
}

fn parse_status(status: &str) -> Result<RecordStatus, ClinicDeskError> {
    if status.trim().is_empty() {
        return Ok(RecordStatus::default());
    }
    Ok(status.parse()?)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Shared backend handle that screens are opened from.
#[derive(uniffi::Object)]
pub struct ClinicDesk {
    gateway: Arc<SqliteGateway>,
    policy: StaleResponsePolicy,
}

impl ClinicDesk {
    fn new(gateway: SqliteGateway, policy: StaleResponsePolicy) -> Arc<Self> {
        Arc::new(Self {
            gateway: Arc::new(gateway),
            policy,
        })
    }
}

#[uniffi::export]
impl ClinicDesk {
    /// Mount the patients screen. Fails with `AuthMissing` without a live session.
    pub fn open_patients_screen(
        &self,
        session: Option<FfiSession>,
    ) -> Result<Arc<PatientsScreenHandle>, ClinicDeskError> {
        let auth = auth_context(session)?;
        let screen = PatientsScreen::mount(Arc::clone(&self.gateway), &auth, self.policy, Utc::now())?;
        Ok(Arc::new(PatientsScreenHandle {
            screen: Mutex::new(screen),
        }))
    }

    /// Mount the appointments screen, with the calendar on today.
    pub fn open_appointments_screen(
        &self,
        session: Option<FfiSession>,
    ) -> Result<Arc<AppointmentsScreenHandle>, ClinicDeskError> {
        let auth = auth_context(session)?;
        let screen =
            AppointmentsScreen::mount(Arc::clone(&self.gateway), &auth, self.policy, Utc::now())?;
        Ok(Arc::new(AppointmentsScreenHandle {
            screen: Mutex::new(screen),
        }))
    }

    /// Mount the dashboard overview.
    pub fn open_dashboard(
        &self,
        session: Option<FfiSession>,
    ) -> Result<Arc<DashboardHandle>, ClinicDeskError> {
        let auth = auth_context(session)?;
        let screen = DashboardScreen::mount(Arc::clone(&self.gateway), &auth, Utc::now())?;
        Ok(Arc::new(DashboardHandle {
            screen: Mutex::new(screen),
        }))
    }
}

// =========================================================================
// Screen Objects
// =========================================================================

type Backend = Arc<SqliteGateway>;

#[derive(uniffi::Object)]
pub struct PatientsScreenHandle {
    screen: Mutex<PatientsScreen<Backend>>,
}

#[uniffi::export]
impl PatientsScreenHandle {
    pub fn table(&self) -> Result<FfiPatientTable, ClinicDeskError> {
        Ok(self.screen.lock()?.table().into())
    }

    /// Apply pending changefeed events. Returns true if the list was refetched.
    pub fn poll(&self) -> Result<bool, ClinicDeskError> {
        Ok(self.screen.lock()?.poll())
    }

    pub fn set_search(&self, query: String) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.set_search(&query);
        Ok(())
    }

    pub fn change_status(&self, id: i64, status: String) -> Result<FfiNotice, ClinicDeskError> {
        let status = parse_status(&status)?;
        Ok(self.screen.lock()?.change_status(id, status).into())
    }

    pub fn request_delete(&self, id: i64) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.request_delete(id);
        Ok(())
    }

    pub fn cancel_delete(&self) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.cancel_delete();
        Ok(())
    }

    pub fn confirm_delete(&self) -> Result<Option<FfiNotice>, ClinicDeskError> {
        Ok(self.screen.lock()?.confirm_delete().map(Into::into))
    }

    pub fn open_add(&self) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.open_add();
        Ok(())
    }

    pub fn close_add(&self) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.close_add();
        Ok(())
    }

    pub fn add_form(&self) -> Result<FfiPatientForm, ClinicDeskError> {
        Ok(self.screen.lock()?.add_form().buffer().clone().into())
    }

    pub fn set_add_form(&self, form: FfiPatientForm) -> Result<(), ClinicDeskError> {
        let form = PatientForm::try_from(form)?;
        *self.screen.lock()?.add_form_mut() = form;
        Ok(())
    }

    pub fn submit_add(&self) -> Result<FfiNotice, ClinicDeskError> {
        Ok(self.screen.lock()?.submit_add(today()).into())
    }

    pub fn take_notices(&self) -> Result<Vec<FfiNotice>, ClinicDeskError> {
        let notices = self.screen.lock()?.take_notices();
        Ok(notices.into_iter().map(Into::into).collect())
    }

    pub fn unmount(&self) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.unmount();
        Ok(())
    }
}

#[derive(uniffi::Object)]
pub struct AppointmentsScreenHandle {
    screen: Mutex<AppointmentsScreen<Backend>>,
}

#[uniffi::export]
impl AppointmentsScreenHandle {
    pub fn table(&self) -> Result<FfiAppointmentTable, ClinicDeskError> {
        Ok(self.screen.lock()?.table().into())
    }

    pub fn poll(&self) -> Result<bool, ClinicDeskError> {
        Ok(self.screen.lock()?.poll())
    }

    /// Select the calendar day (`YYYY-MM-DD`).
    pub fn select_day(&self, day: String) -> Result<(), ClinicDeskError> {
        let day = NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d")
            .map_err(|_| models::ValidationError::InvalidDate(day.clone()))?;
        self.screen.lock()?.select_day(day);
        Ok(())
    }

    /// Days holding appointments, as `YYYY-MM-DD`.
    pub fn marked_days(&self) -> Result<Vec<String>, ClinicDeskError> {
        let days = self.screen.lock()?.marked_days();
        Ok(days.into_iter().map(|d| d.to_string()).collect())
    }

    pub fn day_view(&self) -> Result<FfiDayView, ClinicDeskError> {
        Ok(self.screen.lock()?.day_view().into())
    }

    pub fn change_status(&self, id: i64, status: String) -> Result<FfiNotice, ClinicDeskError> {
        let status = parse_status(&status)?;
        Ok(self.screen.lock()?.change_status(id, status).into())
    }

    pub fn request_delete(&self, id: i64) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.request_delete(id);
        Ok(())
    }

    pub fn cancel_delete(&self) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.cancel_delete();
        Ok(())
    }

    pub fn confirm_delete(&self) -> Result<Option<FfiNotice>, ClinicDeskError> {
        Ok(self.screen.lock()?.confirm_delete().map(Into::into))
    }

    /// Open the add dialog and load the patient picker.
    pub fn open_add(&self) -> Result<Option<FfiNotice>, ClinicDeskError> {
        Ok(self.screen.lock()?.open_add().map(Into::into))
    }

    pub fn close_add(&self) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.close_add();
        Ok(())
    }

    pub fn patient_options(&self) -> Result<Vec<FfiPatientOption>, ClinicDeskError> {
        let screen = self.screen.lock()?;
        Ok(screen.patient_options().iter().map(Into::into).collect())
    }

    pub fn add_form(&self) -> Result<FfiAppointmentForm, ClinicDeskError> {
        Ok(self.screen.lock()?.add_form().buffer().clone().into())
    }

    pub fn set_add_form(&self, form: FfiAppointmentForm) -> Result<(), ClinicDeskError> {
        let form = AppointmentForm::try_from(form)?;
        *self.screen.lock()?.add_form_mut() = form;
        Ok(())
    }

    pub fn submit_add(&self) -> Result<FfiNotice, ClinicDeskError> {
        Ok(self.screen.lock()?.submit_add().into())
    }

    pub fn take_notices(&self) -> Result<Vec<FfiNotice>, ClinicDeskError> {
        let notices = self.screen.lock()?.take_notices();
        Ok(notices.into_iter().map(Into::into).collect())
    }

    pub fn unmount(&self) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.unmount();
        Ok(())
    }
}

#[derive(uniffi::Object)]
pub struct DashboardHandle {
    screen: Mutex<DashboardScreen<Backend>>,
}

#[uniffi::export]
impl DashboardHandle {
    pub fn stats(&self) -> Result<FfiDashboardStats, ClinicDeskError> {
        Ok(self.screen.lock()?.stats().into())
    }

    /// Recompute the counters if anything changed. Returns true if it did.
    pub fn poll(&self) -> Result<bool, ClinicDeskError> {
        Ok(self.screen.lock()?.poll(today()))
    }

    pub fn admin_name(&self) -> Result<String, ClinicDeskError> {
        Ok(self.screen.lock()?.admin_name().to_string())
    }

    pub fn admin_initials(&self) -> Result<String, ClinicDeskError> {
        Ok(self.screen.lock()?.admin_initials())
    }

    pub fn take_notices(&self) -> Result<Vec<FfiNotice>, ClinicDeskError> {
        let notices = self.screen.lock()?.take_notices();
        Ok(notices.into_iter().map(Into::into).collect())
    }

    pub fn unmount(&self) -> Result<(), ClinicDeskError> {
        self.screen.lock()?.unmount();
        Ok(())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSession {
    pub user_id: String,
    pub email: String,
    pub full_name: Option<String>,
    /// Unix seconds
    pub expires_at: i64,
}

impl TryFrom<FfiSession> for Session {
    type Error = ClinicDeskError;

    fn try_from(s: FfiSession) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&s.user_id)
            .map_err(|e| ClinicDeskError::InvalidInput(format!("user id: {e}")))?;
        let expires_at = DateTime::<Utc>::from_timestamp(s.expires_at, 0)
            .ok_or_else(|| ClinicDeskError::InvalidInput("session expiry out of range".into()))?;
        Ok(Session {
            user_id,
            email: s.email,
            full_name: s.full_name,
            expires_at,
        })
    }
}

/// FFI-safe notice.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct FfiNotice {
    /// "success" or "error"
    pub level: String,
    pub title: String,
    pub description: String,
}

impl From<Notice> for FfiNotice {
    fn from(notice: Notice) -> Self {
        let level = match notice.level {
            NoticeLevel::Success => "success",
            NoticeLevel::Error => "error",
        };
        Self {
            level: level.to_string(),
            title: notice.title,
            description: notice.description,
        }
    }
}

/// FFI-safe patient row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientRow {
    pub id: i64,
    pub medical_record_number: String,
    pub name: String,
    pub email_address: String,
    pub phone_number: String,
    pub date_of_birth: String,
    pub home_address: String,
    pub status: String,
}

impl From<PatientRow> for FfiPatientRow {
    fn from(row: PatientRow) -> Self {
        Self {
            id: row.id,
            medical_record_number: row.medical_record_number,
            name: row.name,
            email_address: row.email_address,
            phone_number: row.phone_number,
            date_of_birth: row.date_of_birth,
            home_address: row.home_address,
            status: row.status.to_string(),
        }
    }
}

/// FFI-safe table contents. `message` is set when no rows are shown.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientTable {
    pub loading: bool,
    pub failed: bool,
    pub message: Option<String>,
    pub rows: Vec<FfiPatientRow>,
}

impl From<TableState<PatientRow>> for FfiPatientTable {
    fn from(state: TableState<PatientRow>) -> Self {
        let (loading, failed) = table_flags(&state);
        let message = state.message().map(str::to_string);
        let rows = match state {
            TableState::Rows(rows) => rows.into_iter().map(Into::into).collect(),
            _ => Vec::new(),
        };
        Self {
            loading,
            failed,
            message,
            rows,
        }
    }
}

fn table_flags<R>(state: &TableState<R>) -> (bool, bool) {
    (
        matches!(state, TableState::Loading(_)),
        matches!(state, TableState::Failed(_)),
    )
}

/// FFI-safe appointment row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointmentRow {
    pub id: i64,
    pub patient: String,
    pub date: String,
    pub time: String,
    pub appointment_type: String,
    pub status: String,
    pub notes: String,
}

impl From<AppointmentRow> for FfiAppointmentRow {
    fn from(row: AppointmentRow) -> Self {
        Self {
            id: row.id,
            patient: row.patient,
            date: row.date,
            time: row.time,
            appointment_type: row.appointment_type,
            status: row.status.to_string(),
            notes: row.notes,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointmentTable {
    pub loading: bool,
    pub failed: bool,
    pub message: Option<String>,
    pub rows: Vec<FfiAppointmentRow>,
}

impl From<TableState<AppointmentRow>> for FfiAppointmentTable {
    fn from(state: TableState<AppointmentRow>) -> Self {
        let (loading, failed) = table_flags(&state);
        let message = state.message().map(str::to_string);
        let rows = match state {
            TableState::Rows(rows) => rows.into_iter().map(Into::into).collect(),
            _ => Vec::new(),
        };
        Self {
            loading,
            failed,
            message,
            rows,
        }
    }
}

/// FFI-safe calendar entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCalendarEntry {
    pub id: i64,
    pub time: String,
    pub patient: String,
    pub appointment_type: String,
    pub status: String,
    pub notes: Option<String>,
}

/// FFI-safe selected-day panel.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDayView {
    /// `YYYY-MM-DD`
    pub day: String,
    pub heading: String,
    pub entries: Vec<FfiCalendarEntry>,
    pub message: Option<String>,
}

impl From<DayView> for FfiDayView {
    fn from(view: DayView) -> Self {
        Self {
            day: view.day.to_string(),
            heading: view.heading,
            entries: view
                .entries
                .into_iter()
                .map(|e| FfiCalendarEntry {
                    id: e.id,
                    time: e.time,
                    patient: e.patient,
                    appointment_type: e.appointment_type,
                    status: e.status.to_string(),
                    notes: e.notes,
                })
                .collect(),
            message: view.message.map(str::to_string),
        }
    }
}

/// FFI-safe patient picker option.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientOption {
    pub id: i64,
    pub label: String,
}

impl From<&PatientOption> for FfiPatientOption {
    fn from(option: &PatientOption) -> Self {
        Self {
            id: option.id,
            label: option.label.clone(),
        }
    }
}

/// FFI-safe "Add Patient" form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientForm {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub phone_number: String,
    pub date_of_birth: String,
    pub medical_record_number: String,
    pub home_address: String,
    /// Blank means Pending
    pub status: String,
}

impl From<PatientForm> for FfiPatientForm {
    fn from(form: PatientForm) -> Self {
        Self {
            first_name: form.first_name,
            last_name: form.last_name,
            email_address: form.email_address,
            phone_number: form.phone_number,
            date_of_birth: form.date_of_birth,
            medical_record_number: form.medical_record_number,
            home_address: form.home_address,
            status: form.status.to_string(),
        }
    }
}

impl TryFrom<FfiPatientForm> for PatientForm {
    type Error = ClinicDeskError;

    fn try_from(form: FfiPatientForm) -> Result<Self, Self::Error> {
        Ok(PatientForm {
            status: parse_status(&form.status)?,
            first_name: form.first_name,
            last_name: form.last_name,
            email_address: form.email_address,
            phone_number: form.phone_number,
            date_of_birth: form.date_of_birth,
            medical_record_number: form.medical_record_number,
            home_address: form.home_address,
        })
    }
}

/// FFI-safe "Add Appointment" form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointmentForm {
    pub patient_id: Option<i64>,
    /// `YYYY-MM-DDTHH:MM`
    pub appointment_date: String,
    pub appointment_type: String,
    pub status: String,
    pub notes: String,
}

impl From<AppointmentForm> for FfiAppointmentForm {
    fn from(form: AppointmentForm) -> Self {
        Self {
            patient_id: form.patient_id,
            appointment_date: form.appointment_date,
            appointment_type: form.appointment_type,
            status: form.status.to_string(),
            notes: form.notes,
        }
    }
}

impl TryFrom<FfiAppointmentForm> for AppointmentForm {
    type Error = ClinicDeskError;

    fn try_from(form: FfiAppointmentForm) -> Result<Self, Self::Error> {
        Ok(AppointmentForm {
            status: parse_status(&form.status)?,
            patient_id: form.patient_id,
            appointment_date: form.appointment_date,
            appointment_type: form.appointment_type,
            notes: form.notes,
        })
    }
}

/// FFI-safe dashboard counters.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct FfiDashboardStats {
    pub total_patients: u64,
    pub upcoming_appointments: u64,
    pub confirmed_today: u64,
    pub pending_confirmations: u64,
    pub cancelled_appointments: u64,
}

impl From<views::DashboardStats> for FfiDashboardStats {
    fn from(stats: views::DashboardStats) -> Self {
        Self {
            total_patients: stats.total_patients,
            upcoming_appointments: stats.upcoming_appointments,
            confirmed_today: stats.confirmed_today,
            pending_confirmations: stats.pending_confirmations,
            cancelled_appointments: stats.cancelled_appointments,
        }
    }
}
