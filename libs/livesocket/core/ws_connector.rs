//! Default transport: tokio-tungstenite

use crate::traits::{Connector, LiveSocketError, Result, Transport, WsMessage};
use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

/// Opens real WebSocket connections (ws:// and wss://)
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Transport> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| LiveSocketError::WebSocket(e.to_string()))?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| LiveSocketError::WebSocket(e.to_string()))
            .with(|frame: WsMessage| future::ready(Ok::<_, LiveSocketError>(ws_message_to_tungstenite(frame))));

        // Control frames are handled by tungstenite itself
        let stream = read.filter_map(|item| {
            future::ready(match item {
                Ok(msg) => tungstenite_to_ws_message(msg).map(Ok),
                Err(e) => Some(Err(LiveSocketError::WebSocket(e.to_string()))),
            })
        });

        Ok(Transport::new(Box::pin(sink), Box::pin(stream)))
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}

/// Convert tungstenite Message to WsMessage
fn tungstenite_to_ws_message(msg: Message) -> Option<WsMessage> {
    match msg {
        Message::Text(text) => Some(WsMessage::Text(text)),
        Message::Binary(data) => Some(WsMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}
