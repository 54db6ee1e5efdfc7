//! SQLite storage for the patient and appointment tables.

mod records;
mod schema;

pub use schema::*;

use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::query::contains_ignoring_case;

/// Storage errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Unknown column {column} on {table}")]
    UnknownColumn { table: &'static str, column: String },
}

pub type DbResult<T> = Result<T, DbError>;

/// The clinic's SQLite database: one connection with the dashboard schema applied.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database file at `path`, creating it and its tables if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::with_schema(Connection::open(path)?)
    }

    /// A fresh in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    fn with_schema(conn: Connection) -> DbResult<Self> {
        // Also switches foreign key enforcement on for this connection
        conn.execute_batch(SCHEMA)?;
        register_functions(&conn)?;
        Ok(Self { conn })
    }

    /// Underlying connection, for statements outside the row API.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// SQL functions the row API renders filters with.
///
/// `icontains(haystack, needle)` is a Unicode case-insensitive substring test.
/// It is NULL when the haystack is not text, so it never matches a NULL cell.
fn register_functions(conn: &Connection) -> DbResult<()> {
    conn.create_scalar_function(
        "icontains",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let needle: String = ctx.get(1)?;
            let matched = match ctx.get_raw(0) {
                ValueRef::Text(bytes) => {
                    Some(contains_ignoring_case(&String::from_utf8_lossy(bytes), &needle))
                }
                _ => None,
            };
            Ok(matched)
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_tables_created() {
        let db = Database::open_in_memory().unwrap();
        let mut stmt = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE '%_records'")
            .unwrap();
        let mut tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        tables.sort();
        assert_eq!(tables, vec!["appointments_records", "patients_records"]);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::open_in_memory().unwrap();
        let enabled: i64 = db
            .conn()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_icontains_folds_unicode() {
        let db = Database::open_in_memory().unwrap();
        let check = |haystack: Option<&str>, needle: &str| -> Option<bool> {
            db.conn()
                .query_row("SELECT icontains(?1, ?2)", (haystack, needle), |row| row.get(0))
                .unwrap()
        };
        assert_eq!(check(Some("Åström"), "STRÖ"), Some(true));
        assert_eq!(check(Some("Élodie"), "élo"), Some(true));
        assert_eq!(check(Some("50% off"), "%"), Some(true));
        assert_eq!(check(Some("Ada"), "_"), Some(false));
        assert_eq!(check(None, ""), None);
    }

    #[test]
    fn test_open_on_disk_is_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");

        {
            let db = Database::open(&path).unwrap();
            db.conn()
                .execute(
                    "INSERT INTO patients_records (medical_record_number) VALUES ('MRN-001')",
                    [],
                )
                .unwrap();
        }

        // Schema creation is idempotent and data survives
        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM patients_records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
