use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Observability counters for one feed client.
///
/// The dropped-record counter is shared with the validator that owns it.
#[derive(Debug, Default)]
pub struct FeedStats {
    dropped: Arc<AtomicU64>,
    accepted: AtomicU64,
    connect_attempts: AtomicU64,
    reconnects: AtomicU64,
    /// Unix timestamp (seconds) of the last accepted record
    last_event_epoch_secs: AtomicU64,
}

/// Point-in-time copy of [`FeedStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub dropped: u64,
    pub connect_attempts: u64,
    pub reconnects: u64,
    pub last_event_epoch_secs: u64,
}

impl FeedStats {
    pub fn new(dropped: Arc<AtomicU64>) -> Self {
        Self {
            dropped,
            ..Self::default()
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted(),
            dropped: self.dropped(),
            connect_attempts: self.connect_attempts(),
            reconnects: self.reconnects(),
            last_event_epoch_secs: self.last_event_epoch_secs.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.last_event_epoch_secs.store(now, Ordering::Relaxed);
    }
}
