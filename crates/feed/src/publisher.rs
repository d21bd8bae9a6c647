//! Fan-out of connection state and buffer snapshots
//!
//! Backed by a `watch` channel: every subscriber sees updates in order and
//! never goes backwards, but a slow subscriber only gets the latest value
//! rather than every intermediate one. Each callback subscriber runs on its
//! own delivery task so it cannot stall the feed client.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use idsfeed_schema::ConnectionEvent;

use crate::live_buffer::Snapshot;
use crate::state::ConnectionState;

/// Latest state of the feed as delivered to subscribers
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    pub state: ConnectionState,
    /// Oldest first
    pub events: Snapshot,
    /// Bumped on every publication
    pub sequence: u64,
}

impl FeedUpdate {
    /// Events newest first, the usual display order
    pub fn newest_first(&self) -> impl Iterator<Item = &ConnectionEvent> {
        self.events.iter().rev()
    }
}

/// Receives feed updates. Must return quickly.
pub trait FeedSubscriber: Send + Sync + 'static {
    fn on_update(&self, state: &ConnectionState, events: &[ConnectionEvent]);
}

impl<F> FeedSubscriber for F
where
    F: Fn(&ConnectionState, &[ConnectionEvent]) + Send + Sync + 'static,
{
    fn on_update(&self, state: &ConnectionState, events: &[ConnectionEvent]) {
        self(state, events)
    }
}

/// Handle returned by [`FeedPublisher::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct FeedPublisher {
    tx: watch::Sender<FeedUpdate>,
    subscriptions: DashMap<SubscriptionId, JoinHandle<()>>,
    next_id: AtomicU64,
}

impl FeedPublisher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(FeedUpdate {
            state: ConnectionState::Connecting,
            events: Snapshot::from(Vec::new()),
            sequence: 0,
        });
        Self {
            tx,
            subscriptions: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn publish_state(&self, state: ConnectionState) {
        self.tx.send_modify(|update| {
            update.state = state;
            update.sequence += 1;
        });
    }

    pub(crate) fn publish_events(&self, events: Snapshot) {
        self.tx.send_modify(|update| {
            update.events = events;
            update.sequence += 1;
        });
    }

    /// Latest update
    pub fn current(&self) -> FeedUpdate {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.tx.borrow().state.clone()
    }

    /// Raw receiver for async consumers
    pub fn watch(&self) -> watch::Receiver<FeedUpdate> {
        self.tx.subscribe()
    }

    /// Register a callback subscriber. It is called with the current state
    /// right away and then on every change. Requires a Tokio runtime.
    pub fn subscribe(&self, subscriber: impl FeedSubscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut rx = self.tx.subscribe();

        let task = tokio::spawn(async move {
            loop {
                let update = rx.borrow_and_update().clone();
                subscriber.on_update(&update.state, &update.events);
                if update.state.is_terminal() || rx.changed().await.is_err() {
                    break;
                }
            }
        });

        self.subscriptions.insert(id, task);
        debug!(subscription = id.0, "Subscriber registered");
        id
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.subscriptions.remove(&id) {
            Some((_, task)) => {
                task.abort();
                debug!(subscription = id.0, "Subscriber removed");
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Default for FeedPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FeedPublisher {
    fn drop(&mut self) {
        for entry in self.subscriptions.iter() {
            entry.value().abort();
        }
    }
}
