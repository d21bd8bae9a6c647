use async_trait::async_trait;

use crate::error::TransportError;

/// Inbound traffic from a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Undecoded record payload, text or binary
    Record(Vec<u8>),
    /// Control traffic (ping/pong). Counts as activity, carries no record.
    Keepalive,
}

impl Frame {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Record(text.into().into_bytes())
    }
}

/// Opens streaming sessions to the classifier (WebSocket, test fakes, ...)
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a new session. Called again for every reconnect.
    async fn connect(&self) -> Result<Box<dyn FeedSession>, TransportError>;

    /// Endpoint description for logs
    fn endpoint(&self) -> &str;
}

/// One live connection. Dropping it releases the socket.
#[async_trait]
pub trait FeedSession: Send {
    /// Next inbound frame.
    ///
    /// Any error ends the session; a clean close from the peer is
    /// [`TransportError::ConnectionClosed`].
    async fn recv(&mut self) -> Result<Frame, TransportError>;

    /// Close the connection gracefully
    async fn close(&mut self) -> Result<(), TransportError>;
}
