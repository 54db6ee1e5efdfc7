//! SQLite-backed gateway.

use std::path::Path;
use std::sync::Mutex;

use tracing::{debug, warn};

use super::{
    ChangeKind, Changefeed, DataGateway, EventFilter, GatewayError, GatewayResult, Subscription,
};
use crate::db::{Database, DbError};
use crate::query::{Filter, Query, Row, Table};

/// Gateway over a local SQLite database.
///
/// Every successful write publishes one change event per affected row, including
/// appointments whose patient reference is nulled by a patient delete.
pub struct SqliteGateway {
    db: Mutex<Database>,
    feed: Changefeed,
}

impl SqliteGateway {
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            feed: Changefeed::new(),
        }
    }

    /// Open the database at `path`, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> GatewayResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// The changefeed events are published on.
    pub fn changefeed(&self) -> &Changefeed {
        &self.feed
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T, DbError>) -> GatewayResult<T> {
        let db = self.db.lock().map_err(|_| GatewayError::LockPoisoned)?;
        f(&db).map_err(GatewayError::from)
    }
}

impl DataGateway for SqliteGateway {
    fn fetch_all(&self, table: Table, query: &Query) -> GatewayResult<Vec<Row>> {
        let rows = self.with_db(|db| db.select_rows(table, query))?;
        debug!(table = table.name(), rows = rows.len(), "fetched");
        Ok(rows)
    }

    fn count(&self, table: Table, filter: &Filter) -> GatewayResult<u64> {
        self.with_db(|db| db.count_rows(table, filter))
    }

    fn insert(&self, table: Table, record: Row) -> GatewayResult<i64> {
        let id = self.with_db(|db| db.insert_row(table, &record))?;
        debug!(table = table.name(), id, "inserted");
        self.feed.publish(table, ChangeKind::Insert, id);
        Ok(id)
    }

    fn update(&self, table: Table, id: i64, partial: Row) -> GatewayResult<()> {
        if !self.with_db(|db| db.update_row(table, id, &partial))? {
            warn!(table = table.name(), id, "update of missing record");
            return Err(GatewayError::NotFound {
                table: table.name(),
                id,
            });
        }
        debug!(table = table.name(), id, columns = partial.len(), "updated");
        self.feed.publish(table, ChangeKind::Update, id);
        Ok(())
    }

    fn delete(&self, table: Table, id: i64) -> GatewayResult<()> {
        let (deleted, orphaned) = self.with_db(|db| {
            let orphaned = match table {
                Table::Patients => db.referencing_ids(Table::Appointments, "patient_id", id)?,
                Table::Appointments => Vec::new(),
            };
            Ok((db.delete_row(table, id)?, orphaned))
        })?;

        if !deleted {
            warn!(table = table.name(), id, "delete of missing record");
            return Err(GatewayError::NotFound {
                table: table.name(),
                id,
            });
        }
        debug!(table = table.name(), id, orphaned = orphaned.len(), "deleted");

        self.feed.publish(table, ChangeKind::Delete, id);
        for appointment_id in orphaned {
            self.feed
                .publish(Table::Appointments, ChangeKind::Update, appointment_id);
        }
        Ok(())
    }

    fn subscribe(&self, table: Table, events: EventFilter) -> Subscription {
        self.feed.subscribe(table, events)
    }
}
