//! Bounded live window of validated events
//!
//! Oldest first: new events are appended at the back and, once the buffer is
//! full, the single oldest event is evicted from the front. Only the feed
//! client task mutates it; everyone else sees [`Snapshot`] copies.

use std::collections::VecDeque;
use std::sync::Arc;

use idsfeed_schema::ConnectionEvent;

/// Default number of events retained
pub const DEFAULT_CAPACITY: usize = 100;

/// Immutable copy of the buffer, oldest first. Cheap to clone and send.
pub type Snapshot = Arc<[ConnectionEvent]>;

pub struct LiveBuffer {
    events: VecDeque<ConnectionEvent>,
    capacity: usize,
}

impl LiveBuffer {
    /// Create a buffer holding at most `capacity` events (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event, returning the evicted one if the buffer was full
    pub fn insert(&mut self, event: ConnectionEvent) -> Option<ConnectionEvent> {
        let evicted = if self.events.len() >= self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Snapshot {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently inserted event
    pub fn newest(&self) -> Option<&ConnectionEvent> {
        self.events.back()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for LiveBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
