//! Gateway decorator that fails chosen calls on demand.
//!
//! Used by tests and demos to exercise the error paths of the stores and
//! screens: each queued fault fails exactly one matching call, which then never
//! reaches the wrapped gateway.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{DataGateway, EventFilter, GatewayError, GatewayResult, Subscription};
use crate::query::{Filter, Query, Row, Table};

/// Gateway call kinds that can be failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Count,
    Insert,
    Update,
    Delete,
}

pub struct FaultInjectingGateway<G> {
    inner: G,
    faults: Mutex<VecDeque<(Operation, String)>>,
}

impl<G: DataGateway> FaultInjectingGateway<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            faults: Mutex::new(VecDeque::new()),
        }
    }

    /// Fail the next call of kind `op` with `message`.
    pub fn fail_next(&self, op: Operation, message: impl Into<String>) {
        self.faults().push_back((op, message.into()));
    }

    /// Faults queued but not yet triggered.
    pub fn pending_faults(&self) -> usize {
        self.faults().len()
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    fn faults(&self) -> MutexGuard<'_, VecDeque<(Operation, String)>> {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, op: Operation) -> GatewayResult<()> {
        let mut faults = self.faults();
        match faults.iter().position(|(queued, _)| *queued == op) {
            Some(index) => {
                let message = faults
                    .remove(index)
                    .map(|(_, message)| message)
                    .unwrap_or_default();
                debug!(?op, "injected fault");
                Err(GatewayError::Unavailable(message))
            }
            None => Ok(()),
        }
    }
}

impl<G: DataGateway> DataGateway for FaultInjectingGateway<G> {
    fn fetch_all(&self, table: Table, query: &Query) -> GatewayResult<Vec<Row>> {
        self.check(Operation::Fetch)?;
        self.inner.fetch_all(table, query)
    }

    fn count(&self, table: Table, filter: &Filter) -> GatewayResult<u64> {
        self.check(Operation::Count)?;
        self.inner.count(table, filter)
    }

    fn insert(&self, table: Table, record: Row) -> GatewayResult<i64> {
        self.check(Operation::Insert)?;
        self.inner.insert(table, record)
    }

    fn update(&self, table: Table, id: i64, partial: Row) -> GatewayResult<()> {
        self.check(Operation::Update)?;
        self.inner.update(table, id, partial)
    }

    fn delete(&self, table: Table, id: i64) -> GatewayResult<()> {
        self.check(Operation::Delete)?;
        self.inner.delete(table, id)
    }

    fn subscribe(&self, table: Table, events: EventFilter) -> Subscription {
        self.inner.subscribe(table, events)
    }
}
