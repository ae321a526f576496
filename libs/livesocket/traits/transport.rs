use crate::error::{LiveSocketError, Result};
use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;

/// A single wire-level frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Raw bytes of the frame regardless of kind
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WsMessage::Text(s) => s.as_bytes(),
            WsMessage::Binary(b) => b,
        }
    }
}

/// Outgoing half of an established connection
pub type FrameSink = Pin<Box<dyn Sink<WsMessage, Error = LiveSocketError> + Send>>;

/// Incoming half of an established connection
///
/// The stream ending means the peer closed the connection; an `Err` item is a
/// transport failure.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<WsMessage>> + Send>>;

/// An established, full-duplex connection
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Transport {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Opens transports to an endpoint
///
/// The connection loop owns exactly one in-flight `connect` future at a time
/// and never calls this again while a previous transport is still live.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new connection to `url`
    ///
    /// # Returns
    /// * `Ok(Transport)` - Connection is open
    /// * `Err(LiveSocketError)` - Establishment failed, a reconnect is scheduled
    async fn connect(&self, url: &str) -> Result<Transport>;
}
