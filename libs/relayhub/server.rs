//! WebSocket front end of the hub
//!
//! One accept loop, and per connection a read pump (inline) and a write pump
//! (spawned). The read pump ending unregisters the client, which makes the
//! write pump send Close and exit.

use crate::demo::{DemoBroadcaster, DEMO_START};
use crate::error::{HubError, Result};
use crate::hub::{now_rfc3339, Hub, DEFAULT_CLIENT_BUFFER, DEFAULT_INCOMING_BUFFER};
use futures::{Sink, SinkExt, Stream, StreamExt};
use livesocket::{Message, CLIENT_ID_PARAM, DEFAULT_PATH};
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message as Frame};
use tracing::{debug, error, info, warn};

/// How often the accept loop re-checks the run flag
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Time a write pump gets to send Close after its client is unregistered
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Tunables of a [`HubServer`]
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// Upgrade path; any other path gets 404
    pub path: String,
    pub client_buffer: usize,
    pub incoming_buffer: usize,
    /// Largest inbound message accepted, in bytes
    pub max_frame_bytes: usize,
    pub ping_interval: Duration,
    /// A connection with no inbound traffic for this long is closed
    pub read_timeout: Duration,
    pub demo_interval: Duration,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            client_buffer: DEFAULT_CLIENT_BUFFER,
            incoming_buffer: DEFAULT_INCOMING_BUFFER,
            max_frame_bytes: 5120,
            ping_interval: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            demo_interval: Duration::from_secs(1),
        }
    }
}

/// Relay hub bound to a TCP address
pub struct HubServer {
    listener: TcpListener,
    shared: Arc<Shared>,
}

struct Shared {
    options: HubOptions,
    hub: Arc<Hub>,
    demo: DemoBroadcaster,
    running: Arc<AtomicBool>,
}

impl HubServer {
    /// Bind the listener
    ///
    /// `running` is the process run flag: the server keeps accepting while it
    /// is `true` and winds down once it is cleared.
    pub async fn bind(addr: &str, options: HubOptions, running: Arc<AtomicBool>) -> Result<Self> {
        if !options.path.starts_with('/') {
            return Err(HubError::Configuration(format!(
                "path '{}' must start with '/'",
                options.path
            )));
        }
        if options.ping_interval.is_zero() || options.read_timeout.is_zero() {
            return Err(HubError::Configuration(
                "ping interval and read timeout must be non-zero".to_string(),
            ));
        }

        let listener = TcpListener::bind(addr).await?;
        let hub = Arc::new(Hub::new(options.client_buffer, options.incoming_buffer));
        let demo = DemoBroadcaster::new(options.demo_interval, Arc::clone(&running));

        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                options,
                hub,
                demo,
                running,
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the hub, for pushing server messages and observing incoming ones
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.shared.hub)
    }

    /// Accept connections until the run flag is cleared
    pub async fn run(self) -> Result<()> {
        let addr = self.local_addr()?;
        info!("Relay hub listening on ws://{}{}", addr, self.shared.options.path);

        let mut poll = tokio::time::interval(SHUTDOWN_POLL);
        while self.shared.running.load(Ordering::Acquire) {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "Incoming connection");
                        let shared = Arc::clone(&self.shared);
                        tokio::spawn(async move {
                            if let Err(e) = shared.handle_connection(stream, peer).await {
                                debug!(peer = %peer, "Connection ended: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept failed: {}", e);
                        tokio::time::sleep(SHUTDOWN_POLL).await;
                    }
                },
                _ = poll.tick() => {}
            }
        }

        info!("Relay hub shutting down");
        self.shared.hub.close_all();
        Ok(())
    }
}

impl Shared {
    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let mut requested_id: Option<String> = None;
        let path = self.options.path.as_str();
        let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
            if request.uri().path() != path {
                warn!(path = %request.uri().path(), "Rejecting upgrade on unknown path");
                let mut not_found = ErrorResponse::new(Some("not found".to_string()));
                *not_found.status_mut() = StatusCode::NOT_FOUND;
                return Err(not_found);
            }
            requested_id = request.uri().query().and_then(client_id_from_query);
            Ok(response)
        };

        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.options.max_frame_bytes);
        config.max_frame_size = Some(self.options.max_frame_bytes);

        let ws_stream =
            tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(config)).await?;

        let client_id = requested_id.unwrap_or_else(|| peer.ip().to_string());
        let (connection, outbound) = self.hub.register(client_id.clone());
        let (write, read) = ws_stream.split();

        let mut writer = tokio::spawn(write_pump(
            write,
            outbound,
            self.options.ping_interval,
            client_id.clone(),
        ));

        let writer_done = tokio::select! {
            reason = self.read_pump(read, &client_id) => {
                debug!(client_id = %client_id, "Read pump ended: {}", reason);
                false
            }
            _ = &mut writer => true,
        };

        self.hub.unregister(connection);
        if !writer_done && tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
            writer.abort();
        }

        Ok(())
    }

    /// Read client frames until the connection ends, returning why it ended
    async fn read_pump<S>(&self, mut read: S, client_id: &str) -> String
    where
        S: Stream<Item = std::result::Result<Frame, tungstenite::Error>> + Unpin,
    {
        loop {
            let next = match tokio::time::timeout(self.options.read_timeout, read.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!(client_id = %client_id, "Read timed out");
                    return "read timeout".to_string();
                }
            };

            let data = match next {
                Some(Ok(Frame::Text(text))) => text.into_bytes(),
                Some(Ok(Frame::Binary(data))) => data,
                Some(Ok(Frame::Close(_))) | None => return "closed by client".to_string(),
                // Ping/pong traffic only keeps the connection alive
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    error!(client_id = %client_id, "WebSocket read error: {}", e);
                    return e.to_string();
                }
            };

            let message = match decode_inbound(&data, client_id) {
                Ok(message) => message,
                Err(e) => {
                    error!(client_id = %client_id, "WebSocket read error: {}", e);
                    return e.to_string();
                }
            };

            if message.kind == DEMO_START {
                self.demo.ensure_started(Arc::clone(&self.hub), &message.sender);
            }
            self.hub.publish_incoming(message.clone());
            self.hub.send_message(message);
        }
    }

    #[cfg(test)]
    fn connection_count(&self) -> usize {
        self.hub.client_count()
    }
}

/// Forward buffered messages and keep the connection alive with pings
async fn write_pump<S>(
    mut write: S,
    mut outbound: mpsc::Receiver<Message>,
    ping_interval: Duration,
    client_id: String,
) where
    S: Sink<Frame, Error = tungstenite::Error> + Unpin,
{
    let mut ticker =
        tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);

    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(message) = next else {
                    let _ = write.send(Frame::Close(None)).await;
                    break;
                };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!(client_id = %client_id, "Failed to encode message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Frame::Text(text)).await {
                    error!(client_id = %client_id, "WebSocket write error: {}", e);
                    break;
                }
            }
            _ = ticker.tick() => {
                if write.send(Frame::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!(client_id = %client_id, "Write pump stopped");
}

/// Inbound envelope as clients may send it: every field optional
#[derive(Debug, Deserialize)]
struct InboundEnvelope {
    #[serde(default)]
    sender: String,
    #[serde(default)]
    receiver: String,
    #[serde(default)]
    timestamp: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Parse a client frame, defaulting the sender to `client_id` and the
/// timestamp to now
fn decode_inbound(data: &[u8], client_id: &str) -> Result<Message> {
    let envelope: InboundEnvelope =
        serde_json::from_slice(data).map_err(|e| HubError::InvalidFrame(e.to_string()))?;

    Ok(Message {
        sender: if envelope.sender.is_empty() {
            client_id.to_string()
        } else {
            envelope.sender
        },
        receiver: envelope.receiver,
        timestamp: if envelope.timestamp.is_empty() {
            now_rfc3339()
        } else {
            envelope.timestamp
        },
        kind: envelope.kind,
        payload: envelope.payload,
    })
}

fn client_id_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == CLIENT_ID_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
