//! # LiveSocket
//!
//! A resilient WebSocket messaging client for browser-console style
//! realtime features.
//!
//! ## Features
//!
//! - **Always reconnecting**: exponential backoff (1s doubling, capped at 10s), forever
//! - **Never loses a send**: messages submitted while disconnected are queued and flushed in order
//! - **Fan-out**: any number of listeners receive every inbound message
//! - **Single owner**: one tokio task owns the connection, the queue and the timer
//! - **Pluggable transport**: tokio-tungstenite by default, any [`Connector`] in tests

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use self::core::{
    builder, client, config, connection_state, dispatcher, endpoint, message, outbound,
    ws_connector,
    builder::{states, LiveSocketBuilder},
    client::{ClientEvent, LiveSocket, WeakLiveSocket},
    config::{ClientConfig, DEFAULT_HANDSHAKE_TIMEOUT},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics},
    dispatcher::{Dispatcher, Subscription},
    endpoint::{generate_client_id, Endpoint, CLIENT_ID_PARAM, DEFAULT_PATH},
    message::{Message, OutboundMessage, BROADCAST},
    outbound::{OutboundQueue, Stamper},
    ws_connector::TungsteniteConnector,
};

// Convenience function
pub use self::core::builder as client_builder;
