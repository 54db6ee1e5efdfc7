//! Patients and Appointments screens.
//!
//! A screen is mounted with an explicit [`AuthContext`]; without a live
//! session it refuses to mount. While mounted it owns an [`EntityStore`] that
//! is subscribed to its table. Every user action returns one [`Notice`]
//! describing its outcome. Fetch failures that happen outside a user action
//! (mount, search, changefeed refresh) are queued and collected with
//! `take_notices`. No gateway error escapes a screen.

use std::collections::BTreeSet;

use chrono::{DateTime, Local, NaiveDate, Utc};
use thiserror::Error;
use tracing::{info, warn};

use super::calendar::{days_with_appointments, DayView};
use super::notice::*;
use super::table::*;
use crate::gateway::{DataGateway, EntityGateway, GatewayResult};
use crate::models::{
    Appointment, AppointmentForm, Patient, PatientForm, RecordStatus, ValidationError,
};
use crate::mutator::{self, CreationForm, MutationError};
use crate::query::Query;
use crate::search::SearchFilter;
use crate::session::{AuthContext, Session};
use crate::store::{EntityStore, StaleResponsePolicy};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScreenError {
    /// No live session; the caller should redirect to sign-in.
    #[error("Authentication required")]
    AuthMissing,
}

pub(super) fn live_session(auth: &AuthContext, now: DateTime<Utc>) -> Result<Session, ScreenError> {
    match auth.live_session(now) {
        Some(session) => Ok(session.clone()),
        None => {
            warn!("screen mount refused: no live session");
            Err(ScreenError::AuthMissing)
        }
    }
}

/// Notice for a failed add. Validation problems are described as such.
fn add_failed(error: &MutationError, fallback: &str) -> Notice {
    match error {
        MutationError::Validation(e) => Notice::error(e.to_string()),
        _ => Notice::error(fallback),
    }
}

fn outcome(result: Result<(), MutationError>, success: &str, failure: &str) -> Notice {
    match result {
        Ok(()) => Notice::success(success),
        Err(_) => Notice::error(failure),
    }
}

// =========================================================================
// Patients
// =========================================================================

pub struct PatientsScreen<G: DataGateway> {
    gateway: G,
    session: Session,
    store: EntityStore<Patient>,
    search: SearchFilter,
    add_form: CreationForm<PatientForm>,
    pending_delete: Option<i64>,
    notices: Vec<Notice>,
}

impl<G: DataGateway> PatientsScreen<G> {
    /// Check the session, subscribe to patient changes and load the list.
    pub fn mount(
        gateway: G,
        auth: &AuthContext,
        policy: StaleResponsePolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, ScreenError> {
        let session = live_session(auth, now)?;
        let mut screen = Self {
            gateway,
            session,
            store: EntityStore::with_policy(policy),
            search: SearchFilter::default(),
            add_form: CreationForm::new(),
            pending_delete: None,
            notices: Vec::new(),
        };
        let result = screen.store.activate(&screen.gateway);
        screen.note_fetch(result);
        info!("patients screen mounted");
        Ok(screen)
    }

    /// Release the subscription. Later fetch completions are ignored.
    pub fn unmount(&mut self) {
        self.store.deactivate();
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &EntityStore<Patient> {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Refetch if the changefeed reported anything.
    pub fn poll(&mut self) -> bool {
        match self.store.pump_changes(&self.gateway) {
            Ok(refreshed) => refreshed,
            Err(_) => {
                self.notices.push(Notice::error(PATIENTS_FETCH_FAILED));
                true
            }
        }
    }

    pub fn refresh(&mut self) {
        let result = self.store.refresh(&self.gateway).map(|_| ());
        self.note_fetch(result);
    }

    /// Replace the search query and refetch with it.
    pub fn set_search(&mut self, query: &str) {
        self.search = SearchFilter::new(query);
        self.store.set_filter(self.search.to_filter());
        self.refresh();
    }

    pub fn search(&self) -> &SearchFilter {
        &self.search
    }

    pub fn table(&self) -> TableState<PatientRow> {
        if self.store.is_loading() {
            TableState::Loading(LOADING_PATIENTS)
        } else if self.store.last_error().is_some() {
            TableState::Failed(PATIENTS_FETCH_FAILED)
        } else if self.store.items().is_empty() {
            if self.search.is_empty() {
                TableState::Empty(NO_PATIENTS)
            } else {
                TableState::Empty(NO_MATCHING_PATIENTS)
            }
        } else {
            TableState::Rows(self.store.items().iter().map(PatientRow::from).collect())
        }
    }

    pub fn change_status(&mut self, id: i64, status: RecordStatus) -> Notice {
        let result = mutator::change_status(&mut self.store, &self.gateway, id, status);
        outcome(result, STATUS_UPDATED, STATUS_UPDATE_FAILED)
    }

    /// Ask for confirmation before deleting `id`.
    pub fn request_delete(&mut self, id: i64) {
        self.pending_delete = Some(id);
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn pending_delete(&self) -> Option<i64> {
        self.pending_delete
    }

    /// Delete the patient awaiting confirmation, if any.
    pub fn confirm_delete(&mut self) -> Option<Notice> {
        let id = self.pending_delete.take()?;
        Some(self.delete(id))
    }

    pub fn delete(&mut self, id: i64) -> Notice {
        let result = mutator::delete::<Patient, _>(&self.gateway, id);
        outcome(result, PATIENT_DELETED, PATIENT_DELETE_FAILED)
    }

    pub fn open_add(&mut self) {
        self.add_form.open();
    }

    pub fn close_add(&mut self) {
        self.add_form.close();
    }

    pub fn add_form(&self) -> &CreationForm<PatientForm> {
        &self.add_form
    }

    pub fn add_form_mut(&mut self) -> &mut PatientForm {
        self.add_form.buffer_mut()
    }

    /// Submit the add form. `today` bounds the date of birth.
    pub fn submit_add(&mut self, today: NaiveDate) -> Notice {
        match self.add_form.submit(&self.gateway, today) {
            Ok(_) => Notice::success(PATIENT_ADDED),
            Err(e) => add_failed(&e, PATIENT_ADD_FAILED),
        }
    }

    /// Queued background notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn note_fetch(&mut self, result: GatewayResult<()>) {
        if result.is_err() {
            self.notices.push(Notice::error(PATIENTS_FETCH_FAILED));
        }
    }
}

// =========================================================================
// Appointments
// =========================================================================

/// An entry of the add-appointment patient picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientOption {
    pub id: i64,
    pub label: String,
}

pub struct AppointmentsScreen<G: DataGateway> {
    gateway: G,
    session: Session,
    store: EntityStore<Appointment>,
    add_form: CreationForm<AppointmentForm>,
    patient_options: Vec<PatientOption>,
    selected_day: NaiveDate,
    pending_delete: Option<i64>,
    notices: Vec<Notice>,
}

impl<G: DataGateway> AppointmentsScreen<G> {
    /// Check the session, subscribe to appointment changes and load the list.
    /// The calendar starts on the local day of `now`.
    pub fn mount(
        gateway: G,
        auth: &AuthContext,
        policy: StaleResponsePolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, ScreenError> {
        let session = live_session(auth, now)?;
        let mut screen = Self {
            gateway,
            session,
            store: EntityStore::with_policy(policy),
            add_form: CreationForm::new(),
            patient_options: Vec::new(),
            selected_day: now.with_timezone(&Local).date_naive(),
            pending_delete: None,
            notices: Vec::new(),
        };
        let result = screen.store.activate(&screen.gateway);
        screen.note_fetch(result);
        info!("appointments screen mounted");
        Ok(screen)
    }

    pub fn unmount(&mut self) {
        self.store.deactivate();
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &EntityStore<Appointment> {
        &self.store
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Refetch if the changefeed reported anything.
    pub fn poll(&mut self) -> bool {
        match self.store.pump_changes(&self.gateway) {
            Ok(refreshed) => refreshed,
            Err(_) => {
                self.notices.push(Notice::error(APPOINTMENTS_FETCH_FAILED));
                true
            }
        }
    }

    pub fn refresh(&mut self) {
        let result = self.store.refresh(&self.gateway).map(|_| ());
        self.note_fetch(result);
    }

    pub fn table(&self) -> TableState<AppointmentRow> {
        if self.store.is_loading() {
            TableState::Loading(LOADING_APPOINTMENTS)
        } else if self.store.last_error().is_some() {
            TableState::Failed(APPOINTMENTS_FETCH_FAILED)
        } else if self.store.items().is_empty() {
            TableState::Empty(NO_APPOINTMENTS)
        } else {
            TableState::Rows(self.store.items().iter().map(AppointmentRow::from).collect())
        }
    }

    pub fn select_day(&mut self, day: NaiveDate) {
        self.selected_day = day;
    }

    pub fn selected_day(&self) -> NaiveDate {
        self.selected_day
    }

    /// Days to mark in the date picker.
    pub fn marked_days(&self) -> BTreeSet<NaiveDate> {
        days_with_appointments(self.store.items())
    }

    pub fn day_view(&self) -> DayView {
        DayView::build(self.store.items(), self.selected_day, self.store.is_loading())
    }

    pub fn change_status(&mut self, id: i64, status: RecordStatus) -> Notice {
        let result = mutator::change_status(&mut self.store, &self.gateway, id, status);
        outcome(result, STATUS_UPDATED, STATUS_UPDATE_FAILED)
    }

    pub fn request_delete(&mut self, id: i64) {
        self.pending_delete = Some(id);
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn pending_delete(&self) -> Option<i64> {
        self.pending_delete
    }

    pub fn confirm_delete(&mut self) -> Option<Notice> {
        let id = self.pending_delete.take()?;
        Some(self.delete(id))
    }

    pub fn delete(&mut self, id: i64) -> Notice {
        let result = mutator::delete::<Appointment, _>(&self.gateway, id);
        outcome(result, APPOINTMENT_DELETED, APPOINTMENT_DELETE_FAILED)
    }

    /// Open the add dialog and load the patient picker, ordered by first name.
    pub fn open_add(&mut self) -> Option<Notice> {
        self.add_form.open();
        match self
            .gateway
            .fetch_query::<Patient>(&Query::ascending("first_name"))
        {
            Ok(patients) => {
                self.patient_options = patients
                    .iter()
                    .map(|p| PatientOption {
                        id: p.id,
                        label: p.full_name().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                    })
                    .collect();
                None
            }
            Err(e) => {
                warn!(error = %e, "patient picker fetch failed");
                self.patient_options.clear();
                Some(Notice::error(PATIENTS_FETCH_FAILED))
            }
        }
    }

    pub fn close_add(&mut self) {
        self.add_form.close();
    }

    pub fn patient_options(&self) -> &[PatientOption] {
        &self.patient_options
    }

    pub fn add_form(&self) -> &CreationForm<AppointmentForm> {
        &self.add_form
    }

    pub fn add_form_mut(&mut self) -> &mut AppointmentForm {
        self.add_form.buffer_mut()
    }

    /// Submit the add form. The selected patient must come from the picker.
    pub fn submit_add(&mut self) -> Notice {
        if let Some(id) = self.add_form.buffer().patient_id {
            if !self.patient_options.iter().any(|o| o.id == id) {
                return Notice::error(ValidationError::MissingPatient.to_string());
            }
        }
        match self.add_form.submit(&self.gateway, Local::now().date_naive()) {
            Ok(_) => Notice::success(APPOINTMENT_ADDED),
            Err(e) => add_failed(&e, APPOINTMENT_ADD_FAILED),
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn note_fetch(&mut self, result: GatewayResult<()>) {
        if result.is_err() {
            self.notices.push(Notice::error(APPOINTMENTS_FETCH_FAILED));
        }
    }
}
