//! # LiveSocket core
//!
//! The connection loop, the inbound dispatcher and the outbound queue.
//!
//! ## Example
//!
//! ```rust,ignore
//! use livesocket::{Endpoint, LiveSocket, Message, OutboundMessage};
//!
//! #[tokio::main]
//! async fn main() -> livesocket::Result<()> {
//!     let socket = livesocket::builder()
//!         .endpoint(Endpoint::from_origin("https://console.example.com")?)
//!         .build()?;
//!
//!     let subscription = socket.subscribe(|message: &Message| {
//!         println!("{} from {}", message.kind, message.sender);
//!     });
//!
//!     // Queued until the connection opens; the first send also connects
//!     socket.send(OutboundMessage::new("websocket-demo", "server", "demo-start", ())?);
//!
//!     subscription.unsubscribe();
//!     socket.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod dispatcher;
pub mod endpoint;
pub mod message;
pub mod outbound;
pub mod ws_connector;

// Re-export main types
pub use builder::{states, LiveSocketBuilder};
pub use client::{ClientEvent, LiveSocket, WeakLiveSocket};
pub use config::{ClientConfig, DEFAULT_HANDSHAKE_TIMEOUT};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use dispatcher::{Dispatcher, Subscription};
pub use endpoint::{generate_client_id, Endpoint};
pub use message::{Message, OutboundMessage, BROADCAST};
pub use outbound::{OutboundQueue, Stamper};
pub use ws_connector::TungsteniteConnector;

/// Create a new LiveSocket builder
///
/// Convenience entry point for the type-state builder.
pub fn builder() -> LiveSocketBuilder<states::NoEndpoint> {
    LiveSocketBuilder::new()
}
