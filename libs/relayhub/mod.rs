//! # RelayHub
//!
//! A WebSocket relay server for LiveSocket clients.
//!
//! - Clients connect on `/api/ws?clientId=<id>`
//! - Every message a client sends is observable through [`Hub::incoming`]
//!   and re-routed: receiver `""`/`*` to every client, otherwise to the
//!   clients with that id
//! - A `demo-start` message starts a once-per-second `server-tick` broadcast

pub mod demo;
pub mod error;
pub mod hub;
pub mod server;

pub use demo::{tick_message, DemoBroadcaster, DEMO_START, SERVER_SENDER, SERVER_TICK};
pub use error::{HubError, Result};
pub use hub::{ConnectionId, Hub, DEFAULT_CLIENT_BUFFER, DEFAULT_INCOMING_BUFFER};
pub use server::{HubOptions, HubServer};
