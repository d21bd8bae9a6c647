//! idsfeed-lib: Live feed client for classified network connections
//!
//! Maintains a streaming connection to the traffic classifier, validates each
//! record, keeps a bounded window of recent events, and fans snapshots out
//! to subscribers.

pub mod backoff;
pub mod client;
pub mod error;
pub mod live_buffer;
pub mod metrics;
pub mod publisher;
pub mod server;
pub mod state;
pub mod stats;
pub mod traits;
pub mod websocket;

pub use backoff::{BackoffPolicy, ExponentialBackoff};
pub use client::{FeedClient, FeedHandle};
pub use error::{FeedError, TransportError};
pub use live_buffer::{LiveBuffer, Snapshot};
pub use publisher::{FeedPublisher, FeedSubscriber, FeedUpdate, SubscriptionId};
pub use server::{create_router, run_server, ServerState};
pub use state::ConnectionState;
pub use stats::{FeedStats, StatsSnapshot};
pub use traits::{Connector, FeedSession, Frame};
pub use websocket::WebSocketConnector;
