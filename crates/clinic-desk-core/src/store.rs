//! Per-screen cached entity lists.
//!
//! An [`EntityStore`] holds one table's rows in list order, refreshes them
//! through a [`DataGateway`] and watches the table's changefeed while active.
//!
//! A refresh is split into [`EntityStore::begin_refresh`] (issue the request)
//! and [`EntityStore::complete_refresh`] (apply the response), so overlapping
//! requests that complete out of order can be expressed directly. What happens
//! to an out-of-order response depends on the [`StaleResponsePolicy`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gateway::{
    ChangeEvent, DataGateway, Entity, EntityGateway, EventFilter, GatewayResult, Subscription,
};
use crate::models::RecordStatus;
use crate::query::Filter;

/// How a store treats a response that completes after a later-issued one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleResponsePolicy {
    /// Every response is applied as it arrives; the last to arrive is shown.
    #[default]
    LastResponseWins,
    /// Responses older than the newest applied one are dropped.
    DiscardStale,
}

/// Store lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Active,
    Deactivated,
}

/// An issued fetch whose response has not been applied yet.
#[must_use = "a pending fetch does nothing until completed"]
pub struct PendingFetch<E> {
    seq: u64,
    result: GatewayResult<Vec<E>>,
}

impl<E> PendingFetch<E> {
    /// Issue order of this request (1-based, per store).
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What happened to a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response replaced the list.
    Applied { rows: usize },
    /// Dropped: a later-issued response was already applied.
    Stale,
    /// Dropped: the store was deactivated.
    Discarded,
}

pub struct EntityStore<E: Entity> {
    items: Vec<E>,
    loading: bool,
    in_flight: usize,
    filter: Filter,
    last_error: Option<String>,
    issued: u64,
    newest_applied: u64,
    policy: StaleResponsePolicy,
    lifecycle: Lifecycle,
    subscription: Option<Subscription>,
}

impl<E: Entity> Default for EntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EntityStore<E> {
    pub fn new() -> Self {
        Self::with_policy(StaleResponsePolicy::default())
    }

    pub fn with_policy(policy: StaleResponsePolicy) -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            in_flight: 0,
            filter: Filter::All,
            last_error: None,
            issued: 0,
            newest_applied: 0,
            policy,
            lifecycle: Lifecycle::Idle,
            subscription: None,
        }
    }

    /// Subscribe to the table's changefeed and load the list.
    ///
    /// The subscription stays open even if the initial load fails, so a later
    /// change can still repopulate the list.
    pub fn activate<G: DataGateway + ?Sized>(&mut self, gateway: &G) -> GatewayResult<()> {
        if self.lifecycle == Lifecycle::Active {
            return Ok(());
        }
        self.subscription = Some(gateway.subscribe(E::TABLE, EventFilter::All));
        self.lifecycle = Lifecycle::Active;
        debug!(table = E::TABLE.name(), "store activated");
        self.refresh(gateway).map(|_| ())
    }

    /// Release the subscription. Responses completing afterwards are discarded.
    pub fn deactivate(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if self.lifecycle == Lifecycle::Active {
            debug!(table = E::TABLE.name(), "store deactivated");
        }
        self.lifecycle = Lifecycle::Deactivated;
    }

    /// Fetch and replace the list.
    pub fn refresh<G: DataGateway + ?Sized>(&mut self, gateway: &G) -> GatewayResult<RefreshOutcome> {
        let pending = self.begin_refresh(gateway);
        self.complete_refresh(pending)
    }

    /// Issue a fetch with the current filter.
    pub fn begin_refresh<G: DataGateway + ?Sized>(&mut self, gateway: &G) -> PendingFetch<E> {
        self.issued += 1;
        self.in_flight += 1;
        self.loading = true;
        debug!(table = E::TABLE.name(), seq = self.issued, "refresh issued");
        PendingFetch {
            seq: self.issued,
            result: gateway.fetch_entities::<E>(&self.filter),
        }
    }

    /// Apply the response of an issued fetch.
    ///
    /// A failed fetch clears the list and records the error. Errors of dropped
    /// responses are not reported.
    pub fn complete_refresh(&mut self, pending: PendingFetch<E>) -> GatewayResult<RefreshOutcome> {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.loading = self.in_flight > 0;

        if self.lifecycle == Lifecycle::Deactivated {
            debug!(table = E::TABLE.name(), seq = pending.seq, "late response discarded");
            return Ok(RefreshOutcome::Discarded);
        }
        if self.policy == StaleResponsePolicy::DiscardStale && pending.seq < self.newest_applied {
            debug!(
                table = E::TABLE.name(),
                seq = pending.seq,
                newest = self.newest_applied,
                "stale response dropped"
            );
            return Ok(RefreshOutcome::Stale);
        }
        self.newest_applied = self.newest_applied.max(pending.seq);

        match pending.result {
            Ok(items) => {
                let rows = items.len();
                self.items = items;
                self.last_error = None;
                debug!(table = E::TABLE.name(), seq = pending.seq, rows, "refresh applied");
                Ok(RefreshOutcome::Applied { rows })
            }
            Err(e) => {
                warn!(table = E::TABLE.name(), seq = pending.seq, error = %e, "refresh failed");
                self.items.clear();
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Change events received since the last call, without blocking.
    pub fn take_changes(&self) -> Vec<ChangeEvent> {
        self.subscription
            .as_ref()
            .map(|s| s.pending().collect())
            .unwrap_or_default()
    }

    /// Refresh if any change arrived. Returns whether a refresh ran.
    pub fn pump_changes<G: DataGateway + ?Sized>(&mut self, gateway: &G) -> GatewayResult<bool> {
        let changes = self.take_changes();
        if changes.is_empty() {
            return Ok(false);
        }
        debug!(table = E::TABLE.name(), changes = changes.len(), "changes received");
        self.refresh(gateway)?;
        Ok(true)
    }

    /// Rewrite one entity's status locally. Returns the previous status, or
    /// `None` if no entity has `id`.
    pub fn apply_status(&mut self, id: i64, status: RecordStatus) -> Option<RecordStatus> {
        let entity = self.items.iter_mut().find(|e| e.id() == id)?;
        let previous = entity.status();
        entity.set_status(status);
        Some(previous)
    }

    /// Filter applied to subsequent fetches.
    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn get(&self, id: i64) -> Option<&E> {
        self.items.iter().find(|e| e.id() == id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Message of the last failed fetch, cleared by the next successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn policy(&self) -> StaleResponsePolicy {
        self.policy
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

impl<E: Entity> std::fmt::Debug for EntityStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("table", &E::TABLE)
            .field("items", &self.items.len())
            .field("loading", &self.loading)
            .field("lifecycle", &self.lifecycle)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FaultInjectingGateway, Operation, SqliteGateway};
    use crate::models::{NewPatient, Patient};
    use crate::query::Table;

    fn add_patient(gw: &impl DataGateway, mrn: &str) -> i64 {
        gw.insert_entity::<Patient>(&NewPatient {
            first_name: Some("Test".into()),
            last_name: None,
            email_address: None,
            phone_number: None,
            date_of_birth: None,
            medical_record_number: Some(mrn.into()),
            home_address: None,
            status: RecordStatus::Pending,
        })
        .unwrap()
    }

    fn mrns(store: &EntityStore<Patient>) -> Vec<String> {
        store
            .items()
            .iter()
            .filter_map(|p| p.medical_record_number.clone())
            .collect()
    }

    #[test]
    fn test_initially_loading() {
        let store = EntityStore::<Patient>::new();
        assert!(store.is_loading());
        assert!(store.items().is_empty());
        assert_eq!(store.lifecycle(), Lifecycle::Idle);
    }

    #[test]
    fn test_activate_loads_sorted() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        add_patient(&gw, "MRN-002");
        add_patient(&gw, "MRN-001");

        let mut store = EntityStore::<Patient>::new();
        store.activate(&gw).unwrap();

        assert!(!store.is_loading());
        assert!(store.is_subscribed());
        assert_eq!(mrns(&store), vec!["MRN-001", "MRN-002"]);
    }

    #[test]
    fn test_pump_changes_refetches() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        let mut store = EntityStore::<Patient>::new();
        store.activate(&gw).unwrap();
        assert!(!store.pump_changes(&gw).unwrap());

        add_patient(&gw, "MRN-001");
        assert!(store.pump_changes(&gw).unwrap());
        assert_eq!(store.items().len(), 1);
    }

    #[test]
    fn test_deactivate_releases_subscription() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        let mut store = EntityStore::<Patient>::new();
        store.activate(&gw).unwrap();
        assert_eq!(gw.changefeed().subscriber_count(Table::Patients), 1);

        let pending = store.begin_refresh(&gw);
        store.deactivate();
        assert_eq!(gw.changefeed().subscriber_count(Table::Patients), 0);

        add_patient(&gw, "MRN-001");
        assert_eq!(store.complete_refresh(pending).unwrap(), RefreshOutcome::Discarded);
        assert!(store.items().is_empty());
        assert!(!store.is_loading());
    }

    #[test]
    fn test_drop_releases_subscription() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        {
            let mut store = EntityStore::<Patient>::new();
            store.activate(&gw).unwrap();
        }
        assert_eq!(gw.changefeed().subscriber_count(Table::Patients), 0);
    }

    #[test]
    fn test_failed_activation_keeps_subscription() {
        let gw = FaultInjectingGateway::new(SqliteGateway::open_in_memory().unwrap());
        gw.fail_next(Operation::Fetch, "offline");

        let mut store = EntityStore::<Patient>::new();
        assert!(store.activate(&gw).is_err());
        assert!(store.is_subscribed());
        assert_eq!(store.last_error(), Some("Backend unavailable: offline"));
        assert!(!store.is_loading());
    }

    #[test]
    fn test_fetch_failure_clears_items() {
        let gw = FaultInjectingGateway::new(SqliteGateway::open_in_memory().unwrap());
        add_patient(gw.inner(), "MRN-001");

        let mut store = EntityStore::<Patient>::new();
        store.activate(&gw).unwrap();
        assert_eq!(store.items().len(), 1);

        gw.fail_next(Operation::Fetch, "offline");
        assert!(store.refresh(&gw).is_err());
        assert!(store.items().is_empty());

        store.refresh(&gw).unwrap();
        assert_eq!(store.items().len(), 1);
        assert_eq!(store.last_error(), None);
    }

    #[test]
    fn test_loading_tracks_overlapping_fetches() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        let mut store = EntityStore::<Patient>::new();
        store.activate(&gw).unwrap();

        let first = store.begin_refresh(&gw);
        let second = store.begin_refresh(&gw);
        assert!(store.is_loading());
        store.complete_refresh(second).unwrap();
        assert!(store.is_loading());
        store.complete_refresh(first).unwrap();
        assert!(!store.is_loading());
    }

    #[test]
    fn test_out_of_order_last_response_wins() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        add_patient(&gw, "MRN-001");
        let mut store = EntityStore::<Patient>::new();
        store.activate(&gw).unwrap();

        let first = store.begin_refresh(&gw);
        add_patient(&gw, "MRN-002");
        let second = store.begin_refresh(&gw);

        assert_eq!(
            store.complete_refresh(second).unwrap(),
            RefreshOutcome::Applied { rows: 2 }
        );
        assert_eq!(
            store.complete_refresh(first).unwrap(),
            RefreshOutcome::Applied { rows: 1 }
        );
        assert_eq!(mrns(&store), vec!["MRN-001"]);
    }

    #[test]
    fn test_out_of_order_discard_stale() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        add_patient(&gw, "MRN-001");
        let mut store = EntityStore::<Patient>::with_policy(StaleResponsePolicy::DiscardStale);
        store.activate(&gw).unwrap();

        let first = store.begin_refresh(&gw);
        add_patient(&gw, "MRN-002");
        let second = store.begin_refresh(&gw);
        assert!(second.seq() > first.seq());

        store.complete_refresh(second).unwrap();
        assert_eq!(store.complete_refresh(first).unwrap(), RefreshOutcome::Stale);
        assert_eq!(mrns(&store), vec!["MRN-001", "MRN-002"]);
    }

    #[test]
    fn test_apply_status() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        let id = add_patient(&gw, "MRN-001");
        let mut store = EntityStore::<Patient>::new();
        store.activate(&gw).unwrap();

        assert_eq!(
            store.apply_status(id, RecordStatus::Confirmed),
            Some(RecordStatus::Pending)
        );
        assert_eq!(store.get(id).map(|p| p.status), Some(RecordStatus::Confirmed));
        assert_eq!(store.apply_status(id + 1, RecordStatus::Confirmed), None);
    }

    #[test]
    fn test_policy_config_names() {
        let policy: StaleResponsePolicy = serde_json::from_str("\"discard_stale\"").unwrap();
        assert_eq!(policy, StaleResponsePolicy::DiscardStale);
    }
}
