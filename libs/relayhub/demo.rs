//! Demo tick broadcaster
//!
//! The first `demo-start` message any client sends starts a loop that
//! broadcasts a `server-tick` message to every client once per interval.
//! Later `demo-start` messages are ignored.

use crate::hub::Hub;
use chrono::{DateTime, SecondsFormat, Utc};
use livesocket::{Message, BROADCAST};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Message type that starts the broadcaster
pub const DEMO_START: &str = "demo-start";

/// Message type of every broadcast tick
pub const SERVER_TICK: &str = "server-tick";

/// Sender name used for server-originated messages
pub const SERVER_SENDER: &str = "server";

pub struct DemoBroadcaster {
    interval: Duration,
    started: AtomicBool,
    running: Arc<AtomicBool>,
}

impl DemoBroadcaster {
    /// `running` is the server's run flag; the loop exits once it is cleared
    pub fn new(interval: Duration, running: Arc<AtomicBool>) -> Self {
        Self {
            interval,
            started: AtomicBool::new(false),
            running,
        }
    }

    /// Start the tick loop unless it is already running
    ///
    /// Returns `true` only for the call that started it.
    pub fn ensure_started(&self, hub: Arc<Hub>, requested_by: &str) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        info!(requested_by = %requested_by, "Starting demo broadcast loop");
        let interval = self.interval;
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            let mut counter: u64 = 0;
            while running.load(Ordering::Acquire) {
                ticker.tick().await;
                if !running.load(Ordering::Acquire) {
                    break;
                }
                counter += 1;
                hub.send_message(tick_message(counter, Utc::now()));
            }
            info!("Demo broadcast loop stopped");
        });
        true
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

/// The `counter`-th tick, stamped at `at`
pub fn tick_message(counter: u64, at: DateTime<Utc>) -> Message {
    let timestamp = at.to_rfc3339_opts(SecondsFormat::Micros, true);
    Message {
        sender: SERVER_SENDER.to_string(),
        receiver: BROADCAST.to_string(),
        timestamp: timestamp.clone(),
        kind: SERVER_TICK.to_string(),
        payload: json!({
            "message": format!("server tick #{}", counter),
            "sentAt": timestamp,
        }),
    }
}
