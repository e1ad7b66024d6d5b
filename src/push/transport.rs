//! # Push Transport
//!
//! Text-message socket underneath the STOMP session. The channel only ever
//! talks to these traits, so tests can substitute an in-process broker.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{RealtimeError, RealtimeResult};

/// Opens connections to the message broker
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    async fn open(&self, endpoint: &str) -> RealtimeResult<Box<dyn PushConnection>>;
}

/// One open broker connection carrying text frames
///
/// `next_text` must be cancel safe: the channel polls it inside `select!`.
#[async_trait]
pub trait PushConnection: Send {
    async fn send_text(&mut self, text: String) -> RealtimeResult<()>;

    /// Next inbound text message, `None` once the peer has closed
    async fn next_text(&mut self) -> Option<RealtimeResult<String>>;

    async fn close(&mut self);
}

/// WebSocket transport backed by `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushTransport for WebSocketTransport {
    async fn open(&self, endpoint: &str) -> RealtimeResult<Box<dyn PushConnection>> {
        let (stream, response) = connect_async(endpoint).await?;
        debug!(
            endpoint = %endpoint,
            status = %response.status(),
            "WebSocket connection established"
        );
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushConnection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> RealtimeResult<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Option<RealtimeResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes).map_err(|e| {
                        RealtimeError::Protocol(format!("Binary frame is not UTF-8: {e}"))
                    }))
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Broker closed the WebSocket");
                    return None;
                }
                // Ping/pong replies are queued by tungstenite itself
                Ok(other) => trace!(kind = ?other, "Skipping control frame"),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "WebSocket close handshake failed");
        }
    }
}
