//! Feed client state machine
//!
//! A single task owns the classifier session and the live buffer:
//!
//! ```text
//! connecting --ok--> connected --transport failure--> disconnected
//!     |                                                    |
//!     +--fail--> error --------- backoff delay ------------+--> connecting
//! ```
//!
//! Malformed records are dropped without touching the connection. Only an
//! explicit shutdown (or dropping the [`FeedHandle`]) leaves the loop, and
//! then the state becomes `stopped`.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use idsfeed_config::FeedConfig;
use idsfeed_schema::Validator;

use crate::backoff::{BackoffPolicy, ExponentialBackoff};
use crate::error::{FeedError, TransportError};
use crate::live_buffer::LiveBuffer;
use crate::metrics::FeedMetrics;
use crate::publisher::{FeedPublisher, FeedSubscriber, SubscriptionId};
use crate::state::ConnectionState;
use crate::stats::FeedStats;
use crate::traits::{Connector, FeedSession, Frame};

pub struct FeedClient<C: Connector> {
    name: String,
    connector: C,
    validator: Validator,
    buffer: LiveBuffer,
    backoff: Box<dyn BackoffPolicy>,
    read_timeout: Option<Duration>,
    publisher: Arc<FeedPublisher>,
    stats: Arc<FeedStats>,
    metrics: FeedMetrics,
}

impl<C: Connector + 'static> FeedClient<C> {
    pub fn new(config: &FeedConfig, connector: C) -> Self {
        let validator = Validator::new(config.confidence_default);
        let stats = Arc::new(FeedStats::new(validator.dropped_handle()));
        Self {
            name: config.name.clone(),
            connector,
            validator,
            buffer: LiveBuffer::new(config.buffer_capacity),
            backoff: Box::new(ExponentialBackoff::from_config(&config.backoff)),
            read_timeout: config.read_timeout(),
            publisher: Arc::new(FeedPublisher::new()),
            stats,
            metrics: FeedMetrics::new(config.name.clone()),
        }
    }

    /// Replace the reconnect delay policy
    pub fn with_backoff(mut self, backoff: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    pub fn publisher(&self) -> Arc<FeedPublisher> {
        Arc::clone(&self.publisher)
    }

    pub fn stats(&self) -> Arc<FeedStats> {
        Arc::clone(&self.stats)
    }

    /// Run the client on a background task
    pub fn spawn(self) -> FeedHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let publisher = self.publisher();
        let stats = self.stats();
        let task = tokio::spawn(self.run(shutdown_rx));
        FeedHandle {
            shutdown: shutdown_tx,
            task,
            publisher,
            stats,
        }
    }

    /// Drive the state machine until `shutdown` flips to true or its sender
    /// is dropped. Always ends in [`ConnectionState::Stopped`].
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(feed = %self.name, endpoint = %self.connector.endpoint(), "Starting feed client");

        let reason = self.drive(&mut shutdown).await;
        debug!(feed = %self.name, reason = %reason, "Feed loop exited");

        self.set_state(ConnectionState::Stopped);
        info!(
            feed = %self.name,
            accepted = self.stats.accepted(),
            dropped = self.stats.dropped(),
            reconnects = self.stats.reconnects(),
            "Feed client stopped"
        );
    }

    /// Connect/receive/backoff loop. Only returns on shutdown.
    async fn drive(&mut self, shutdown: &mut watch::Receiver<bool>) -> FeedError {
        let mut first_attempt = true;

        loop {
            if !first_attempt {
                self.stats.record_reconnect();
                self.metrics.inc_reconnect();
            }
            first_attempt = false;

            self.set_state(ConnectionState::Connecting);
            self.stats.record_connect_attempt();

            let connected = tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => return FeedError::ShutdownRequested,
                result = self.connector.connect() => result,
            };

            match connected {
                Ok(mut session) => {
                    self.backoff.reset();
                    self.set_state(ConnectionState::Connected);

                    let ended = self.receive(session.as_mut(), shutdown).await;
                    if let Err(e) = session.close().await {
                        debug!(feed = %self.name, error = %e, "Error closing session");
                    }
                    drop(session);

                    match ended {
                        FeedError::ShutdownRequested => return ended,
                        other => {
                            warn!(feed = %self.name, error = %other, "Classifier connection lost");
                            self.set_state(ConnectionState::Disconnected);
                        }
                    }
                }
                Err(e) => {
                    warn!(feed = %self.name, error = %e, "Failed to connect to classifier");
                    self.set_state(ConnectionState::Error(e.to_string()));
                }
            }

            let delay = self.backoff.next_delay();
            info!(
                feed = %self.name,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after backoff"
            );
            tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => return FeedError::ShutdownRequested,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Pump frames from a connected session. Returns why the session ended.
    async fn receive(
        &mut self,
        session: &mut dyn FeedSession,
        shutdown: &mut watch::Receiver<bool>,
    ) -> FeedError {
        let read_timeout = self.read_timeout;
        loop {
            let frame = tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => return FeedError::ShutdownRequested,
                frame = recv_frame(session, read_timeout) => frame,
            };

            match frame {
                Ok(Frame::Record(payload)) => self.handle_record(&payload),
                Ok(Frame::Keepalive) => trace!(feed = %self.name, "Keepalive"),
                Err(e) => return FeedError::Transport(e),
            }
        }
    }

    fn handle_record(&mut self, payload: &[u8]) {
        match self.validator.validate_slice(payload) {
            Ok(event) => {
                trace!(
                    feed = %self.name,
                    id = %event.id,
                    classification = %event.classification,
                    "Accepted record"
                );
                self.metrics.inc_record(event.classification);
                self.stats.record_accepted();
                self.buffer.insert(event);
                self.metrics.set_buffer_len(self.buffer.len());
                self.publisher.publish_events(self.buffer.snapshot());
            }
            Err(e) => {
                let err = FeedError::from(e);
                self.metrics.inc_dropped();
                debug!(
                    feed = %self.name,
                    error = %err,
                    dropped = self.stats.dropped(),
                    "Dropped record"
                );
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        info!(feed = %self.name, state = %state, "Connection state changed");
        self.metrics.set_connected(state.is_connected());
        self.publisher.publish_state(state);
    }
}

/// The timeout is re-armed for every frame, keepalives included
async fn recv_frame(
    session: &mut dyn FeedSession,
    read_timeout: Option<Duration>,
) -> Result<Frame, TransportError> {
    match read_timeout {
        Some(limit) => tokio::time::timeout(limit, session.recv())
            .await
            .map_err(|_| TransportError::ReadTimeout(limit.as_secs()))?,
        None => session.recv().await,
    }
}

/// Resolves once shutdown is requested or the requester has gone away
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Owner's handle to a spawned [`FeedClient`]. Dropping it stops the client.
pub struct FeedHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    publisher: Arc<FeedPublisher>,
    stats: Arc<FeedStats>,
}

impl FeedHandle {
    pub fn publisher(&self) -> Arc<FeedPublisher> {
        Arc::clone(&self.publisher)
    }

    pub fn stats(&self) -> Arc<FeedStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> ConnectionState {
        self.publisher.state()
    }

    pub fn subscribe(&self, subscriber: impl FeedSubscriber) -> SubscriptionId {
        self.publisher.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.publisher.unsubscribe(id)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request shutdown and wait until the client reaches `stopped`
    pub async fn shutdown(self) -> Result<(), FeedError> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| FeedError::TaskFailed(e.to_string()))
    }
}
