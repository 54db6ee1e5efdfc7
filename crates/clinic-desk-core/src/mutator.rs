//! User-initiated writes.
//!
//! Status changes are optimistic and run in two phases: [`StatusChange::apply`]
//! rewrites the cached entity immediately, then [`StatusChange::settle`]
//! confirms it or compensates by re-fetching, depending on the outcome of the
//! backend write. Deletes are not applied locally; the changefeed reflects them.
//! New records are buffered in a [`CreationForm`] until submitted.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::gateway::{DataGateway, Entity, EntityGateway, GatewayError, GatewayResult};
use crate::models::{
    Appointment, AppointmentForm, Patient, PatientForm, RecordStatus, ValidationError,
};
use crate::store::EntityStore;

/// Errors from user-initiated writes.
#[derive(Error, Debug)]
pub enum MutationError {
    #[error("{table} record {id} is not loaded")]
    UnknownRecord { table: &'static str, id: i64 },

    #[error("Invalid form: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Write(#[from] GatewayError),
}

/// A status rewrite applied locally but not yet confirmed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a tentative status change must be settled"]
pub struct StatusChange {
    pub id: i64,
    pub previous: RecordStatus,
    pub next: RecordStatus,
}

impl StatusChange {
    /// Tentatively set the status of entity `id` in `store`.
    pub fn apply<E: Entity>(
        store: &mut EntityStore<E>,
        id: i64,
        next: RecordStatus,
    ) -> Result<Self, MutationError> {
        let previous =
            store
                .apply_status(id, next)
                .ok_or_else(|| MutationError::UnknownRecord {
                    table: E::TABLE.name(),
                    id,
                })?;
        Ok(Self { id, previous, next })
    }

    /// Issue the backend write for this change.
    pub fn write<E: Entity, G: DataGateway + ?Sized>(&self, gateway: &G) -> GatewayResult<()> {
        gateway.update_status::<E>(self.id, self.next)
    }

    /// Keep the local value if `outcome` succeeded; otherwise re-fetch so the
    /// store shows what the backend holds, and report the write failure.
    ///
    /// If the compensating re-fetch fails too, the store is left in its fetch
    /// failure state.
    pub fn settle<E: Entity, G: DataGateway + ?Sized>(
        self,
        store: &mut EntityStore<E>,
        gateway: &G,
        outcome: GatewayResult<()>,
    ) -> Result<(), MutationError> {
        match outcome {
            Ok(()) => {
                info!(
                    table = E::TABLE.name(),
                    id = self.id,
                    status = self.next.as_str(),
                    "status updated"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    table = E::TABLE.name(),
                    id = self.id,
                    error = %e,
                    "status update failed, re-fetching"
                );
                if let Err(refetch) = store.refresh(gateway) {
                    warn!(table = E::TABLE.name(), error = %refetch, "compensating re-fetch failed");
                }
                Err(MutationError::Write(e))
            }
        }
    }
}

/// Optimistically change the status of entity `id`.
pub fn change_status<E: Entity, G: DataGateway + ?Sized>(
    store: &mut EntityStore<E>,
    gateway: &G,
    id: i64,
    next: RecordStatus,
) -> Result<(), MutationError> {
    let change = StatusChange::apply(store, id, next)?;
    let outcome = change.write::<E, G>(gateway);
    change.settle(store, gateway, outcome)
}

/// Delete entity `id` on the backend. The cached list is left untouched.
pub fn delete<E: Entity, G: DataGateway + ?Sized>(gateway: &G, id: i64) -> Result<(), MutationError> {
    match gateway.delete_entity::<E>(id) {
        Ok(()) => {
            info!(table = E::TABLE.name(), id, "deleted");
            Ok(())
        }
        Err(e) => {
            warn!(table = E::TABLE.name(), id, error = %e, "delete failed");
            Err(e.into())
        }
    }
}

/// A form buffer that validates into an insert payload.
pub trait Draft: Default {
    type Target: Entity;

    fn validate(&self, today: NaiveDate)
        -> Result<<Self::Target as Entity>::New, ValidationError>;
}

impl Draft for PatientForm {
    type Target = Patient;

    fn validate(&self, today: NaiveDate) -> Result<<Patient as Entity>::New, ValidationError> {
        PatientForm::validate(self, today)
    }
}

impl Draft for AppointmentForm {
    type Target = Appointment;

    fn validate(&self, _today: NaiveDate) -> Result<<Appointment as Entity>::New, ValidationError> {
        AppointmentForm::validate(self)
    }
}

/// Creation surface: an open/closed flag plus the buffered form.
#[derive(Debug, Clone, Default)]
pub struct CreationForm<F: Draft> {
    open: bool,
    buffer: F,
}

impl<F: Draft> CreationForm<F> {
    pub fn new() -> Self {
        Self {
            open: false,
            buffer: F::default(),
        }
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Close without submitting. The buffer is kept.
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn buffer(&self) -> &F {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut F {
        &mut self.buffer
    }

    /// Validate and insert the buffer. On success the buffer is cleared and
    /// the surface closed; on any failure both are left as they were.
    pub fn submit<G: DataGateway + ?Sized>(
        &mut self,
        gateway: &G,
        today: NaiveDate,
    ) -> Result<i64, MutationError> {
        let record = self.buffer.validate(today)?;
        let table = <F::Target as Entity>::TABLE;
        match gateway.insert_entity::<F::Target>(&record) {
            Ok(id) => {
                info!(table = table.name(), id, "record added");
                self.buffer = F::default();
                self.open = false;
                Ok(id)
            }
            Err(e) => {
                warn!(table = table.name(), error = %e, "add failed");
                Err(e.into())
            }
        }
    }
}
