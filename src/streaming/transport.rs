//! Outbound channel transport boundary.
//!
//! The publisher talks to a connection-oriented publish/subscribe
//! primitive: connect, join a named room, emit tagged messages. The
//! production implementation is a WebSocket client; tests substitute a
//! counting fake.

use async_trait::async_trait;
use futures_util::SinkExt;
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::StreamError;

#[async_trait]
pub trait ChannelTransport: Send {
    async fn connect(&mut self) -> Result<(), StreamError>;
    async fn join(&mut self, room: &str) -> Result<(), StreamError>;
    async fn emit(&mut self, event: &str, data: serde_json::Value) -> Result<(), StreamError>;
    async fn close(&mut self);
}

/// WebSocket client transport. Wire format is one JSON text message per
/// call: `{"join": room}` on join, `{"event": event, "data": data}` on
/// emit.
pub struct WebSocketTransport {
    url: String,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
        }
    }

    async fn send(&mut self, value: serde_json::Value) -> Result<(), StreamError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(StreamError::InvalidState("transport not connected"))?;
        stream
            .send(Message::Text(value.to_string()))
            .await
            .map_err(|e| StreamError::ConnectionDropped(e.to_string()))
    }
}

#[async_trait]
impl ChannelTransport for WebSocketTransport {
    async fn connect(&mut self) -> Result<(), StreamError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| StreamError::ConnectFailed(e.to_string()))?;
        debug!(url = %self.url, "websocket connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn join(&mut self, room: &str) -> Result<(), StreamError> {
        self.send(json!({ "join": room })).await
    }

    async fn emit(&mut self, event: &str, data: serde_json::Value) -> Result<(), StreamError> {
        self.send(json!({ "event": event, "data": data })).await
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }
}
