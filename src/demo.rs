//! Demo client: requests the server tick broadcast and acknowledges ticks
//!
//! Every inbound message is recorded as an `In` event. Each `server-tick`
//! is answered with a `client-ack` carrying `"Ack: <tick message>"`, recorded
//! as an `Out` event.

use chrono::{SecondsFormat, Utc};
use livesocket::{LiveSocket, Message, OutboundMessage, Subscription};
use parking_lot::Mutex;
use relayhub::{DEMO_START, SERVER_TICK};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Sender name used by the demo component
pub const DEMO_SENDER: &str = "websocket-demo";

/// Receiver of demo requests and acks
pub const DEMO_RECEIVER: &str = "server";

/// Reply type for every tick
pub const CLIENT_ACK: &str = "client-ack";

/// Shown for messages without a payload
pub const EMPTY_PAYLOAD: &str = "<empty>";

/// One line of the demo transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoEvent {
    pub direction: Direction,
    pub summary: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Human-readable form of a payload
///
/// A string `message` field wins, then a plain string payload, then compact
/// JSON.
pub fn summarize_payload(payload: &Value) -> String {
    if let Some(message) = payload.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    if let Some(text) = payload.as_str() {
        return text.to_string();
    }
    payload.to_string()
}

/// Payload as logged by the hub: compact JSON, or `<empty>` when absent
pub fn describe_payload(payload: &Value) -> String {
    match payload {
        Value::Null => EMPTY_PAYLOAD.to_string(),
        Value::String(text) if text.is_empty() => EMPTY_PAYLOAD.to_string(),
        other => other.to_string(),
    }
}

/// The `client-ack` reply for a tick
pub fn ack_for(tick: &Message) -> OutboundMessage {
    OutboundMessage::with_value(
        DEMO_SENDER,
        DEMO_RECEIVER,
        CLIENT_ACK,
        json!({
            "message": format!("Ack: {}", summarize_payload(&tick.payload)),
            "repliedAt": now(),
        }),
    )
}

/// The request that starts the server broadcast
pub fn demo_start() -> OutboundMessage {
    OutboundMessage::with_value(
        DEMO_SENDER,
        DEMO_RECEIVER,
        DEMO_START,
        json!({
            "message": "start websocket demo broadcast",
            "requestedAt": now(),
        }),
    )
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Drives the demo on top of a shared [`LiveSocket`]
pub struct DemoClient {
    socket: LiveSocket,
    subscription: Subscription,
    events: Arc<Mutex<Vec<DemoEvent>>>,
}

impl DemoClient {
    /// Subscribe to the socket and start acknowledging ticks
    pub fn attach(socket: LiveSocket) -> Self {
        let events: Arc<Mutex<Vec<DemoEvent>>> = Arc::new(Mutex::new(Vec::new()));

        let replier = socket.downgrade();
        let log = Arc::clone(&events);
        let subscription = socket.subscribe(move |message: &Message| {
            let summary = format!("[{}] {}", message.kind, summarize_payload(&message.payload));
            info!("<- {}", summary);
            log.lock().push(DemoEvent {
                direction: Direction::In,
                summary,
                timestamp: message.timestamp.clone(),
            });

            if message.kind == SERVER_TICK {
                let ack = ack_for(message);
                let summary = format!("[{}] {}", CLIENT_ACK, summarize_payload(&ack.payload));
                let timestamp = ack.payload["repliedAt"].as_str().unwrap_or_default().to_string();
                if !replier.send(ack) {
                    warn!("Socket dropped, tick not acknowledged");
                    return;
                }
                info!("-> {}", summary);
                log.lock().push(DemoEvent {
                    direction: Direction::Out,
                    summary,
                    timestamp,
                });
            }
        });

        Self {
            socket,
            subscription,
            events,
        }
    }

    /// Ask the server to start broadcasting ticks
    ///
    /// Opens the connection if needed; the request is queued until it is open.
    pub fn start(&self) {
        self.socket.connect();
        self.socket.send(demo_start());
        info!("-> [{}] requested server broadcast", DEMO_START);
    }

    /// Transcript ordered by timestamp
    pub fn events(&self) -> Vec<DemoEvent> {
        let mut events = self.events.lock().clone();
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        events
    }

    /// Whether at least one tick has arrived
    pub fn is_active(&self) -> bool {
        self.events
            .lock()
            .iter()
            .any(|event| event.direction == Direction::In && event.summary.starts_with("[server-tick]"))
    }

    pub fn socket(&self) -> &LiveSocket {
        &self.socket
    }

    /// Stop acknowledging ticks; the socket keeps running
    ///
    /// Returns whether the listener was still registered.
    pub fn detach(&self) -> bool {
        let removed = self.subscription.unsubscribe();
        if !removed {
            warn!("Demo listener was already removed");
        }
        removed
    }

    /// Stop listening and shut the socket down
    pub async fn stop(self) {
        self.detach();
        self.socket.shutdown().await;
    }
}
