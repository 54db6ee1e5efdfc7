//! End-to-end screen flows against an in-memory backend.

use chrono::{Duration, NaiveDate, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use clinic_desk_core::gateway::{
    EntityGateway, FaultInjectingGateway, Operation, SqliteGateway,
};
use clinic_desk_core::models::{
    parse_local_datetime, Appointment, NewAppointment, NewPatient, Patient, RecordStatus,
    UNKNOWN_PATIENT,
};
use clinic_desk_core::query::Filter;
use clinic_desk_core::store::{EntityStore, RefreshOutcome, StaleResponsePolicy};
use clinic_desk_core::views::notice::{STATUS_UPDATED, STATUS_UPDATE_FAILED};
use clinic_desk_core::views::{AppointmentsScreen, Notice, PatientsScreen};
use clinic_desk_core::{AuthContext, SearchFilter, Session};

fn auth() -> AuthContext {
    AuthContext::signed_in(Session {
        user_id: Uuid::new_v4(),
        email: "front.desk@clinic.test".to_string(),
        full_name: None,
        expires_at: Utc::now() + Duration::hours(8),
    })
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
}

fn new_patient(first: &str, mrn: &str) -> NewPatient {
    NewPatient {
        first_name: Some(first.to_string()),
        last_name: Some("Rivera".to_string()),
        email_address: None,
        phone_number: None,
        date_of_birth: None,
        medical_record_number: Some(mrn.to_string()),
        home_address: None,
        status: RecordStatus::Pending,
    }
}

fn new_appointment(patient_id: i64, when: &str) -> NewAppointment {
    NewAppointment {
        patient_id,
        appointment_date: parse_local_datetime(when).unwrap(),
        appointment_type: "Follow-up".to_string(),
        status: RecordStatus::Pending,
        notes: None,
    }
}

fn mrns(patients: &[Patient]) -> Vec<String> {
    patients
        .iter()
        .filter_map(|p| p.medical_record_number.clone())
        .collect()
}

#[test]
fn test_add_patient_clears_form_and_lists_patient() {
    let gw = SqliteGateway::open_in_memory().unwrap();
    let mut screen =
        PatientsScreen::mount(&gw, &auth(), StaleResponsePolicy::default(), Utc::now()).unwrap();

    screen.open_add();
    {
        let form = screen.add_form_mut();
        form.first_name = "Maria".to_string();
        form.last_name = "Rivera".to_string();
        form.medical_record_number = "MRN-042".to_string();
        form.date_of_birth = "1985-02-14".to_string();
    }
    let notice = screen.submit_add(today());
    assert!(!notice.is_error(), "{notice:?}");
    assert!(!screen.add_form().is_open());
    assert!(screen.add_form().buffer().is_blank());

    let fetched = gw.fetch_entities::<Patient>(&Filter::All).unwrap();
    assert_eq!(mrns(&fetched), vec!["MRN-042"]);

    assert!(screen.poll());
    assert_eq!(screen.table().rows().len(), 1);
}

#[test]
fn test_add_appointment_clears_form_and_lists_appointment() {
    let gw = SqliteGateway::open_in_memory().unwrap();
    let patient_id = gw.insert_entity::<Patient>(&new_patient("Maria", "MRN-001")).unwrap();
    let mut screen =
        AppointmentsScreen::mount(&gw, &auth(), StaleResponsePolicy::default(), Utc::now())
            .unwrap();

    assert_eq!(screen.open_add(), None);
    {
        let form = screen.add_form_mut();
        form.patient_id = Some(patient_id);
        form.appointment_date = "2024-01-05T09:00".to_string();
        form.appointment_type = "Check-up".to_string();
    }
    let notice = screen.submit_add();
    assert!(!notice.is_error(), "{notice:?}");
    assert!(screen.add_form().buffer().is_blank());

    let fetched = gw.fetch_entities::<Appointment>(&Filter::All).unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].patient_id, Some(patient_id));
}

#[test]
fn test_failed_add_keeps_form() {
    let gw = FaultInjectingGateway::new(SqliteGateway::open_in_memory().unwrap());
    let mut screen =
        PatientsScreen::mount(&gw, &auth(), StaleResponsePolicy::default(), Utc::now()).unwrap();

    screen.open_add();
    screen.add_form_mut().first_name = "Maria".to_string();
    gw.fail_next(Operation::Insert, "insert rejected");

    assert!(screen.submit_add(today()).is_error());
    assert!(screen.add_form().is_open());
    assert_eq!(screen.add_form().buffer().first_name, "Maria");

    // Retry with the same buffer
    assert!(!screen.submit_add(today()).is_error());
    assert!(screen.add_form().buffer().is_blank());
}

#[test]
fn test_status_change_success_matches_backend() {
    let gw = SqliteGateway::open_in_memory().unwrap();
    let id = gw.insert_entity::<Patient>(&new_patient("Maria", "MRN-001")).unwrap();
    let mut screen =
        PatientsScreen::mount(&gw, &auth(), StaleResponsePolicy::default(), Utc::now()).unwrap();

    let notice = screen.change_status(id, RecordStatus::Confirmed);
    assert_eq!(notice, Notice::success(STATUS_UPDATED));
    assert_eq!(screen.store().get(id).unwrap().status, RecordStatus::Confirmed);

    let stored = gw.fetch_entities::<Patient>(&Filter::eq("id", id)).unwrap();
    assert_eq!(stored[0].status, RecordStatus::Confirmed);
}

#[test]
fn test_status_change_failure_reconciles_to_backend() {
    let gw = FaultInjectingGateway::new(SqliteGateway::open_in_memory().unwrap());
    let id = gw.insert_entity::<Appointment>(&new_appointment(
        gw.insert_entity::<Patient>(&new_patient("Maria", "MRN-001")).unwrap(),
        "2024-01-05T09:00",
    ))
    .unwrap();
    let mut screen =
        AppointmentsScreen::mount(&gw, &auth(), StaleResponsePolicy::default(), Utc::now())
            .unwrap();

    gw.fail_next(Operation::Update, "write rejected");
    let notice = screen.change_status(id, RecordStatus::Cancelled);
    assert_eq!(notice, Notice::error(STATUS_UPDATE_FAILED));
    assert_eq!(screen.store().get(id).unwrap().status, RecordStatus::Pending);

    let stored = gw.fetch_entities::<Appointment>(&Filter::All).unwrap();
    assert_eq!(stored[0].status, RecordStatus::Pending);
}

#[test]
fn test_mrn_round_trip() {
    let gw = SqliteGateway::open_in_memory().unwrap();
    gw.insert_entity::<Patient>(&new_patient("Maria", "MRN-001")).unwrap();
    gw.insert_entity::<Patient>(&new_patient("Tomas", "MRN-002")).unwrap();

    let all = gw.fetch_entities::<Patient>(&Filter::All).unwrap();
    let matching: Vec<_> = all
        .iter()
        .filter(|p| p.medical_record_number.as_deref() == Some("MRN-001"))
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].first_name.as_deref(), Some("Maria"));
}

#[test]
fn test_calendar_groups_by_day() {
    let gw = SqliteGateway::open_in_memory().unwrap();
    let patient_id = gw.insert_entity::<Patient>(&new_patient("Maria", "MRN-001")).unwrap();
    // Inserted out of order
    for when in ["2024-01-05T14:30", "2024-01-06T10:00", "2024-01-05T09:00"] {
        gw.insert_entity::<Appointment>(&new_appointment(patient_id, when))
            .unwrap();
    }
    let mut screen =
        AppointmentsScreen::mount(&gw, &auth(), StaleResponsePolicy::default(), Utc::now())
            .unwrap();

    screen.select_day(today());
    let view = screen.day_view();
    let times: Vec<_> = view.entries.iter().map(|e| e.time.as_str()).collect();
    assert_eq!(times, vec!["9:00 AM", "2:30 PM"]);
    assert_eq!(view.message, None);

    let marked: Vec<_> = screen.marked_days().into_iter().collect();
    assert_eq!(
        marked,
        vec![today(), NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()]
    );
}

#[test]
fn test_deleting_patient_keeps_appointments() {
    let gw = SqliteGateway::open_in_memory().unwrap();
    let mut last = 0;
    for n in 1..=7 {
        last = gw
            .insert_entity::<Patient>(&new_patient("Patient", &format!("MRN-{n:03}")))
            .unwrap();
    }
    assert_eq!(last, 7);
    let appointment_id = gw
        .insert_entity::<Appointment>(&new_appointment(7, "2024-01-05T09:00"))
        .unwrap();

    let mut patients =
        PatientsScreen::mount(&gw, &auth(), StaleResponsePolicy::default(), Utc::now()).unwrap();
    let mut appointments =
        AppointmentsScreen::mount(&gw, &auth(), StaleResponsePolicy::default(), Utc::now())
            .unwrap();
    assert_eq!(appointments.table().rows()[0].patient, "Patient Rivera");

    patients.request_delete(7);
    assert!(!patients.confirm_delete().unwrap().is_error());
    // Not removed locally until the changefeed reports it
    assert_eq!(patients.table().rows().len(), 7);
    assert!(patients.poll());
    assert_eq!(patients.table().rows().len(), 6);

    assert!(appointments.poll());
    let rows = appointments.table().rows().to_vec();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, appointment_id);
    assert_eq!(rows[0].patient, UNKNOWN_PATIENT);
}

#[test]
fn test_overlapping_refresh_last_response_wins() {
    let gw = SqliteGateway::open_in_memory().unwrap();
    gw.insert_entity::<Patient>(&new_patient("Maria", "MRN-001")).unwrap();
    let mut store = EntityStore::<Patient>::new();
    store.activate(&gw).unwrap();

    let first = store.begin_refresh(&gw);
    gw.insert_entity::<Patient>(&new_patient("Tomas", "MRN-002")).unwrap();
    let second = store.begin_refresh(&gw);

    store.complete_refresh(second).unwrap();
    store.complete_refresh(first).unwrap();
    // The first-issued response landed last and is what is shown
    assert_eq!(mrns(store.items()), vec!["MRN-001"]);
    assert!(!store.is_loading());
}

#[test]
fn test_overlapping_refresh_discard_stale() {
    let gw = SqliteGateway::open_in_memory().unwrap();
    gw.insert_entity::<Patient>(&new_patient("Maria", "MRN-001")).unwrap();
    let mut store = EntityStore::<Patient>::with_policy(StaleResponsePolicy::DiscardStale);
    store.activate(&gw).unwrap();

    let first = store.begin_refresh(&gw);
    gw.insert_entity::<Patient>(&new_patient("Tomas", "MRN-002")).unwrap();
    let second = store.begin_refresh(&gw);

    store.complete_refresh(second).unwrap();
    assert_eq!(store.complete_refresh(first).unwrap(), RefreshOutcome::Stale);
    assert_eq!(mrns(store.items()), vec!["MRN-001", "MRN-002"]);
}

#[test]
fn test_unmount_releases_subscription() {
    let gw = SqliteGateway::open_in_memory().unwrap();
    let mut screen =
        PatientsScreen::mount(&gw, &auth(), StaleResponsePolicy::default(), Utc::now()).unwrap();
    assert_eq!(
        gw.changefeed()
            .subscriber_count(clinic_desk_core::query::Table::Patients),
        1
    );
    screen.unmount();
    assert_eq!(
        gw.changefeed()
            .subscriber_count(clinic_desk_core::query::Table::Patients),
        0
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_empty_search_same_as_no_filter(
        records in prop::collection::vec(("[A-Za-z]{0,8}", "MRN-[0-9]{3}"), 0..12),
    ) {
        let gw = SqliteGateway::open_in_memory().unwrap();
        for (first, mrn) in &records {
            gw.insert_entity::<Patient>(&new_patient(first, mrn)).unwrap();
        }

        let unfiltered = gw.fetch_entities::<Patient>(&Filter::All).unwrap();
        let searched = gw
            .fetch_entities::<Patient>(&SearchFilter::new("").to_filter())
            .unwrap();

        let ids = |ps: &[Patient]| ps.iter().map(|p| p.id).collect::<Vec<_>>();
        prop_assert_eq!(ids(&searched), ids(&unfiltered));
    }
}
