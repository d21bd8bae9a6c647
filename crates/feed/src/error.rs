use idsfeed_schema::ValidationError;
use thiserror::Error;

/// Connection-level failures. Any of these ends the current session.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("read timeout after {0} seconds")]
    ReadTimeout(u64),
}

#[derive(Error, Debug)]
pub enum FeedError {
    /// Per-record, recoverable
    #[error("malformed record: {0}")]
    MalformedRecord(#[from] ValidationError),
    /// Triggers disconnect and reconnect
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Intentional and terminal
    #[error("shutdown requested")]
    ShutdownRequested,
    #[error("feed task failed: {0}")]
    TaskFailed(String),
}
