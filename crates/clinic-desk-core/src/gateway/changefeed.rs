//! Realtime change notifications.
//!
//! Writers publish one [`ChangeEvent`] per affected row. Each [`Subscription`]
//! owns a channel receiver; the consumer drains it whenever it chooses, so
//! nothing runs behind its back. Dropping the subscription unsubscribes.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::query::Table;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }
}

/// Which change kinds a subscription receives (`*` or a single kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Only(ChangeKind),
}

impl EventFilter {
    pub fn accepts(&self, kind: ChangeKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(k) => *k == kind,
        }
    }
}

/// One committed row change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// Id of the changed row
    pub id: i64,
    pub committed_at: DateTime<Utc>,
}

struct Subscriber {
    id: u64,
    table: Table,
    events: EventFilter,
    tx: Sender<ChangeEvent>,
}

#[derive(Default)]
struct FeedState {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// Fan-out hub for change events.
#[derive(Clone, Default)]
pub struct Changefeed {
    state: Arc<Mutex<FeedState>>,
}

impl Changefeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription for changes to `table`.
    pub fn subscribe(&self, table: Table, events: EventFilter) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.subscribers.push(Subscriber {
            id,
            table,
            events,
            tx,
        });
        debug!(subscription = id, table = table.name(), "changefeed subscribed");

        Subscription {
            id,
            table,
            rx,
            feed: Arc::downgrade(&self.state),
        }
    }

    /// Deliver a change to every matching subscriber.
    pub fn publish(&self, table: Table, kind: ChangeKind, id: i64) {
        let event = ChangeEvent {
            table,
            kind,
            id,
            committed_at: Utc::now(),
        };
        let mut state = lock(&self.state);
        // A failed send means the receiver is gone; forget that subscriber.
        state.subscribers.retain(|s| {
            if s.table != table || !s.events.accepts(kind) {
                return true;
            }
            s.tx.send(event.clone()).is_ok()
        });
        debug!(table = table.name(), kind = kind.as_str(), id, "change published");
    }

    /// Number of live subscriptions on `table`.
    pub fn subscriber_count(&self, table: Table) -> usize {
        lock(&self.state)
            .subscribers
            .iter()
            .filter(|s| s.table == table)
            .count()
    }
}

fn lock(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    // The state is a plain list; a panic elsewhere cannot leave it half-updated.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle on a changefeed subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    table: Table,
    rx: Receiver<ChangeEvent>,
    feed: Weak<Mutex<FeedState>>,
}

impl Subscription {
    /// Events received so far, without blocking.
    pub fn pending(&self) -> impl Iterator<Item = ChangeEvent> + '_ {
        self.rx.try_iter()
    }

    /// Unsubscribe now.
    pub fn cancel(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("table", &self.table)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.feed.upgrade() {
            lock(&state).subscribers.retain(|s| s.id != self.id);
            debug!(subscription = self.id, table = self.table.name(), "changefeed unsubscribed");
        }
    }
}
