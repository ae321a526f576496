//! # LiveSocket Traits
//!
//! The seams of the client:
//!
//! - **Connector**: Open a transport to the endpoint (tokio-tungstenite by default)
//! - **MessageListener**: Receive inbound messages
//! - **ReconnectionStrategy**: Control the delay between reconnects
//! - **LiveSocketError**: Error type for construction and transport plumbing

pub mod error;
pub mod listener;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{LiveSocketError, Result};
pub use listener::MessageListener;
pub use reconnect::{ExponentialBackoff, FixedDelay, ReconnectionStrategy};
pub use transport::{Connector, FrameSink, FrameStream, Transport, WsMessage};
