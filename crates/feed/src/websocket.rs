//! WebSocket transport to the classifier
//!
//! One JSON record per text or binary frame. Payloads are handed on
//! undecoded; anything that does not parse is the validator's problem, not
//! the transport's. Ping and pong frames surface as keepalives so the read
//! timeout sees them.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};
use url::Url;

use crate::error::TransportError;
use crate::traits::{Connector, FeedSession, Frame};

/// WebSocket connector for the classifier stream
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn FeedSession>, TransportError> {
        let url = Url::parse(&self.url)
            .map_err(|e| TransportError::ConnectionFailed(format!("invalid url {}: {}", self.url, e)))?;

        debug!(url = %url, "Connecting to classifier WebSocket");
        let (ws, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        info!(url = %self.url, status = ?response.status(), "Classifier WebSocket connected");

        Ok(Box::new(WebSocketSession { ws }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// A connected classifier WebSocket
pub struct WebSocketSession {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedSession for WebSocketSession {
    async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Frame::text(text)),
                Some(Ok(Message::Binary(data))) => return Ok(Frame::Record(data)),
                Some(Ok(Message::Ping(data))) => {
                    trace!("Received WS ping, sending pong");
                    self.ws.send(Message::Pong(data)).await?;
                    return Ok(Frame::Keepalive);
                }
                Some(Ok(Message::Pong(_))) => return Ok(Frame::Keepalive),
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Classifier WebSocket closed");
                    return Err(TransportError::ConnectionClosed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::ConnectionClosed),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.ws.close(None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_endpoint() {
        let connector = WebSocketConnector::new("ws://127.0.0.1:8765/stream");
        assert_eq!(connector.endpoint(), "ws://127.0.0.1:8765/stream");
    }

    #[tokio::test]
    async fn test_connect_invalid_url() {
        let connector = WebSocketConnector::new("not a url");
        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WebSocketConnector::new(format!("ws://{}", addr));
        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, TransportError::ConnectionFailed(_)));
    }
}
