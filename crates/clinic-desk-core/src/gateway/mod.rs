//! Data gateway: the backend's select/insert/update/delete API plus its
//! changefeed, behind one trait.
//!
//! [`DataGateway`] works on untyped [`Row`]s, which keeps it object-safe and
//! lets decorators such as [`FaultInjectingGateway`] wrap any backend.
//! [`EntityGateway`] layers typed access to [`Patient`] and [`Appointment`] on
//! top of it.

mod changefeed;
mod entity;
mod faulty;
mod sqlite;

pub use changefeed::*;
pub use entity::*;
pub use faulty::*;
pub use sqlite::*;

use std::sync::Arc;

use thiserror::Error;

use crate::db::DbError;
use crate::query::{Filter, Query, Row, Table};

/// Gateway errors. Each one is reported once to the caller; nothing retries.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Backend error: {0}")]
    Backend(#[from] DbError),

    #[error("Could not decode {table} record: {source}")]
    Decode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not encode record: {0}")]
    Encode(String),

    #[error("{table} record {id} not found")]
    NotFound { table: &'static str, id: i64 },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend connection lock poisoned")]
    LockPoisoned,
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Backend query API for the dashboard tables.
pub trait DataGateway {
    /// Fetch every row of `table` matching `query`, in query order.
    fn fetch_all(&self, table: Table, query: &Query) -> GatewayResult<Vec<Row>>;

    /// Exact number of rows matching `filter`.
    fn count(&self, table: Table, filter: &Filter) -> GatewayResult<u64>;

    /// Insert a record, returning its server-assigned id.
    fn insert(&self, table: Table, record: Row) -> GatewayResult<i64>;

    /// Apply a partial record to row `id`.
    fn update(&self, table: Table, id: i64, partial: Row) -> GatewayResult<()>;

    fn delete(&self, table: Table, id: i64) -> GatewayResult<()>;

    /// Subscribe to changes of `table`.
    fn subscribe(&self, table: Table, events: EventFilter) -> Subscription;

    fn unsubscribe(&self, subscription: Subscription) {
        subscription.cancel();
    }
}

impl<G: DataGateway + ?Sized> DataGateway for &G {
    fn fetch_all(&self, table: Table, query: &Query) -> GatewayResult<Vec<Row>> {
        (**self).fetch_all(table, query)
    }

    fn count(&self, table: Table, filter: &Filter) -> GatewayResult<u64> {
        (**self).count(table, filter)
    }

    fn insert(&self, table: Table, record: Row) -> GatewayResult<i64> {
        (**self).insert(table, record)
    }

    fn update(&self, table: Table, id: i64, partial: Row) -> GatewayResult<()> {
        (**self).update(table, id, partial)
    }

    fn delete(&self, table: Table, id: i64) -> GatewayResult<()> {
        (**self).delete(table, id)
    }

    fn subscribe(&self, table: Table, events: EventFilter) -> Subscription {
        (**self).subscribe(table, events)
    }
}

impl<G: DataGateway + ?Sized> DataGateway for Arc<G> {
    fn fetch_all(&self, table: Table, query: &Query) -> GatewayResult<Vec<Row>> {
        (**self).fetch_all(table, query)
    }

    fn count(&self, table: Table, filter: &Filter) -> GatewayResult<u64> {
        (**self).count(table, filter)
    }

    fn insert(&self, table: Table, record: Row) -> GatewayResult<i64> {
        (**self).insert(table, record)
    }

    fn update(&self, table: Table, id: i64, partial: Row) -> GatewayResult<()> {
        (**self).update(table, id, partial)
    }

    fn delete(&self, table: Table, id: i64) -> GatewayResult<()> {
        (**self).delete(table, id)
    }

    fn subscribe(&self, table: Table, events: EventFilter) -> Subscription {
        (**self).subscribe(table, events)
    }
}
