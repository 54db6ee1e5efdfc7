//! SQLite schema definition.

/// Complete database schema for the dashboard tables.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT,
    last_name TEXT,
    email_address TEXT,
    phone_number TEXT,
    date_of_birth TEXT,                          -- YYYY-MM-DD
    medical_record_number TEXT,
    home_address TEXT,
    status TEXT NOT NULL DEFAULT 'Pending'
        CHECK (status IN ('Pending', 'Confirmed', 'Cancelled')),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_mrn ON patients_records(medical_record_number);
CREATE INDEX IF NOT EXISTS idx_patients_first_name ON patients_records(first_name);

-- ============================================================================
-- Appointments
-- ============================================================================

-- Deleting a patient keeps its appointments; the reference is nulled.
CREATE TABLE IF NOT EXISTS appointments_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER REFERENCES patients_records(id) ON DELETE SET NULL,
    appointment_date TEXT NOT NULL,              -- YYYY-MM-DDTHH:MM:SS, local time
    appointment_type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Pending'
        CHECK (status IN ('Pending', 'Confirmed', 'Cancelled')),
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments_records(appointment_date);
CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments_records(patient_id);
CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments_records(status);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_status_check_constraint() {
        let conn = setup();

        let result = conn.execute(
            "INSERT INTO patients_records (status) VALUES ('Completed')",
            [],
        );
        assert!(result.is_err());

        conn.execute("INSERT INTO patients_records (first_name) VALUES ('Ada')", [])
            .unwrap();
        let status: String = conn
            .query_row("SELECT status FROM patients_records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "Pending");
    }

    #[test]
    fn test_appointment_requires_date_and_type() {
        let conn = setup();

        let result = conn.execute(
            "INSERT INTO appointments_records (appointment_type) VALUES ('Check-up')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO appointments_records (appointment_date) VALUES ('2024-01-05T09:00:00')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_patient_delete_nulls_reference() {
        let conn = setup();

        conn.execute("INSERT INTO patients_records (id, first_name) VALUES (7, 'Ada')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO appointments_records (patient_id, appointment_date, appointment_type)
             VALUES (7, '2024-01-05T09:00:00', 'Consultation')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM patients_records WHERE id = 7", [])
            .unwrap();

        let (count, patient_id): (i64, Option<i64>) = conn
            .query_row(
                "SELECT COUNT(*), MAX(patient_id) FROM appointments_records",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(patient_id, None);
    }

    #[test]
    fn test_unknown_patient_reference_rejected() {
        let conn = setup();
        let result = conn.execute(
            "INSERT INTO appointments_records (patient_id, appointment_date, appointment_type)
             VALUES (99, '2024-01-05T09:00:00', 'Consultation')",
            [],
        );
        assert!(result.is_err());
    }
}
