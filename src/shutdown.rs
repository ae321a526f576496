//! Graceful shutdown for the demo client and the relay hub
//!
//! One run flag is shared by the Ctrl+C handler, the binaries' main loops and
//! the hub accept loop. [`ShutdownManager::drain`] then stops what was
//! registered: client sockets first, so nothing new is queued, then hub tasks.

use livesocket::LiveSocket;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

/// How long a hub task gets to return after the flag is cleared
pub const DEFAULT_SERVER_GRACE: Duration = Duration::from_secs(5);

/// What [`ShutdownManager::drain`] stopped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub sockets_closed: usize,
    /// Messages still queued on the closed sockets
    pub undelivered: usize,
    pub servers_stopped: usize,
    /// Hub tasks that returned an error, panicked or overran the grace period
    pub server_failures: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.server_failures.is_empty()
    }
}

/// Owns the run flag and everything that must stop with it
pub struct ShutdownManager {
    flag: Arc<AtomicBool>,
    sockets: Mutex<Vec<LiveSocket>>,
    servers: Mutex<Vec<JoinHandle<relayhub::Result<()>>>>,
    server_grace: Duration,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::with_server_grace(DEFAULT_SERVER_GRACE)
    }

    pub fn with_server_grace(server_grace: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
            sockets: Mutex::new(Vec::new()),
            servers: Mutex::new(Vec::new()),
            server_grace,
        }
    }

    /// Spawn a Ctrl+C signal handler that clears the run flag
    pub fn spawn_signal_handler(&self) {
        let flag = Arc::clone(&self.flag);
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal (Ctrl+C), stopping realtime services...");
                flag.store(false, Ordering::Release);
            }
        });
    }

    pub fn is_running(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear the run flag without a signal
    pub fn trigger(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// The run flag, for [`relayhub::HubServer::bind`]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Shut `socket` down during [`drain`](Self::drain)
    pub fn track_socket(&self, socket: &LiveSocket) {
        self.sockets.lock().push(socket.clone());
    }

    /// Await a spawned `HubServer::run` during [`drain`](Self::drain)
    pub fn track_server(&self, task: JoinHandle<relayhub::Result<()>>) {
        self.servers.lock().push(task);
    }

    /// Sleep for a duration, but wake early once the flag is cleared
    pub async fn interruptible_sleep(&self, duration: Duration) {
        let check_interval = Duration::from_millis(50);
        let mut elapsed = Duration::ZERO;

        while elapsed < duration && self.is_running() {
            sleep(check_interval).await;
            elapsed += check_interval;
        }
    }

    /// Clear the flag and stop every tracked socket and hub task
    pub async fn drain(&self) -> ShutdownReport {
        self.trigger();

        let sockets = std::mem::take(&mut *self.sockets.lock());
        let servers = std::mem::take(&mut *self.servers.lock());
        let mut report = ShutdownReport::default();

        for socket in sockets {
            socket.shutdown().await;
            report.undelivered += socket.queued();
            report.sockets_closed += 1;
        }

        for task in servers {
            let abort = task.abort_handle();
            match tokio::time::timeout(self.server_grace, task).await {
                Ok(Ok(Ok(()))) => report.servers_stopped += 1,
                Ok(Ok(Err(e))) => report.server_failures.push(e.to_string()),
                Ok(Err(e)) => report.server_failures.push(format!("hub task failed: {}", e)),
                Err(_) => {
                    abort.abort();
                    report.server_failures.push(format!(
                        "hub did not stop within {:?}",
                        self.server_grace
                    ));
                }
            }
        }

        if report.undelivered > 0 {
            warn!(undelivered = report.undelivered, "Discarded queued messages on shutdown");
        }
        info!(
            sockets = report.sockets_closed,
            servers = report.servers_stopped,
            failures = report.server_failures.len(),
            "Shutdown complete"
        );
        report
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesocket::OutboundMessage;
    use relayhub::{HubError, HubOptions, HubServer};
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_interruptible_sleep_wakes_on_trigger() {
        let shutdown = Arc::new(ShutdownManager::new());
        let trigger = Arc::clone(&shutdown);
        tokio::spawn(async move {
            sleep(Duration::from_millis(120)).await;
            trigger.trigger();
        });

        let start = tokio::time::Instant::now();
        shutdown.interruptible_sleep(Duration::from_secs(60)).await;
        assert!(tokio::time::Instant::now() - start < Duration::from_secs(1));
        assert!(!shutdown.is_running());
    }

    #[tokio::test]
    async fn test_drain_closes_sockets_and_counts_undelivered() {
        let shutdown = ShutdownManager::new();
        let socket = LiveSocket::builder().host("127.0.0.1:9").build().unwrap();
        shutdown.track_socket(&socket);

        for kind in ["a", "b"] {
            socket.send(OutboundMessage::with_value("websocket-demo", "server", kind, json!({})));
        }

        let report = shutdown.drain().await;
        assert_eq!(report.sockets_closed, 1);
        assert_eq!(report.undelivered, 2);
        assert!(report.is_clean());
        assert_eq!(socket.connection_state(), livesocket::ConnectionState::ShutDown);
        assert!(!shutdown.is_running());
    }

    #[tokio::test]
    async fn test_drain_stops_hub_through_shared_flag() {
        let shutdown = ShutdownManager::new();
        let server = HubServer::bind("127.0.0.1:0", HubOptions::default(), shutdown.flag())
            .await
            .unwrap();
        shutdown.track_server(tokio::spawn(server.run()));

        let report = shutdown.drain().await;
        assert_eq!(report.servers_stopped, 1);
        assert!(report.is_clean());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_reports_failed_and_stuck_hubs() {
        let shutdown = ShutdownManager::with_server_grace(Duration::from_secs(1));
        shutdown.track_server(tokio::spawn(async {
            Err(HubError::Configuration("bind lost".to_string()))
        }));
        shutdown.track_server(tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok(())
        }));

        let report = shutdown.drain().await;
        assert_eq!(report.servers_stopped, 0);
        assert_eq!(report.server_failures.len(), 2);
        assert!(report.server_failures[0].contains("bind lost"));
        assert!(report.server_failures[1].contains("did not stop"));
        assert!(!report.is_clean());
    }
}
