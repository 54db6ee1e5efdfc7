//! Typed access to the dashboard tables.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::{DataGateway, GatewayError, GatewayResult};
use crate::models::{Appointment, NewAppointment, NewPatient, Patient, RecordStatus};
use crate::query::{Embed, Filter, Query, Row, Table};

/// Patient name lookup attached to every fetched appointment.
pub const PATIENT_NAME_EMBED: Embed = Embed {
    alias: "patient",
    table: Table::Patients,
    foreign_key: "patient_id",
    columns: &["first_name", "last_name"],
};

/// A record type backed by one table.
pub trait Entity: Clone + DeserializeOwned {
    const TABLE: Table;

    /// Insert payload.
    type New: Serialize;

    fn id(&self) -> i64;

    fn status(&self) -> RecordStatus;

    fn set_status(&mut self, status: RecordStatus);

    /// Ordering and embeds every list of this entity is fetched with.
    fn base_query() -> Query;
}

impl Entity for Patient {
    const TABLE: Table = Table::Patients;
    type New = NewPatient;

    fn id(&self) -> i64 {
        self.id
    }

    fn status(&self) -> RecordStatus {
        self.status
    }

    fn set_status(&mut self, status: RecordStatus) {
        self.status = status;
    }

    fn base_query() -> Query {
        Query::ascending("medical_record_number")
    }
}

impl Entity for Appointment {
    const TABLE: Table = Table::Appointments;
    type New = NewAppointment;

    fn id(&self) -> i64 {
        self.id
    }

    fn status(&self) -> RecordStatus {
        self.status
    }

    fn set_status(&mut self, status: RecordStatus) {
        self.status = status;
    }

    fn base_query() -> Query {
        Query::ascending("appointment_date").embed(PATIENT_NAME_EMBED)
    }
}

/// Partial record carrying only a status.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusPatch {
    pub status: RecordStatus,
}

/// Typed operations over any [`DataGateway`].
pub trait EntityGateway: DataGateway {
    /// Fetch all `E` matching `filter`, in the entity's list order.
    fn fetch_entities<E: Entity>(&self, filter: &Filter) -> GatewayResult<Vec<E>> {
        self.fetch_query(&E::base_query().filter(filter.clone()))
    }

    /// Fetch all `E` selected by an explicit query.
    fn fetch_query<E: Entity>(&self, query: &Query) -> GatewayResult<Vec<E>> {
        self.fetch_all(E::TABLE, query)?
            .into_iter()
            .map(|row| decode::<E>(row))
            .collect()
    }

    fn insert_entity<E: Entity>(&self, record: &E::New) -> GatewayResult<i64> {
        self.insert(E::TABLE, encode(record)?)
    }

    fn update_entity<E: Entity, P: Serialize>(&self, id: i64, patch: &P) -> GatewayResult<()> {
        self.update(E::TABLE, id, encode(patch)?)
    }

    fn update_status<E: Entity>(&self, id: i64, status: RecordStatus) -> GatewayResult<()> {
        self.update_entity::<E, _>(id, &StatusPatch { status })
    }

    fn delete_entity<E: Entity>(&self, id: i64) -> GatewayResult<()> {
        self.delete(E::TABLE, id)
    }
}

impl<G: DataGateway + ?Sized> EntityGateway for G {}

fn decode<E: Entity>(row: Row) -> GatewayResult<E> {
    serde_json::from_value(Value::Object(row)).map_err(|source| GatewayError::Decode {
        table: E::TABLE.name(),
        source,
    })
}

fn encode<T: Serialize>(record: &T) -> GatewayResult<Row> {
    match serde_json::to_value(record) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(GatewayError::Encode(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(GatewayError::Encode(e.to_string())),
    }
}
