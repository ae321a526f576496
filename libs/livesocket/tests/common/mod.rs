//! Common test utilities for LiveSocket integration tests
//!
//! Two kinds of peer:
//! - [`MockWsServer`]: a real tokio-tungstenite server on loopback
//! - [`ScriptedConnector`]: an in-memory transport for paused-clock tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{Sink, SinkExt, StreamExt};
use livesocket::{Connector, LiveSocketError, Result, Transport, WsMessage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[derive(Default)]
struct ServerState {
    /// Text frames received from clients, in arrival order
    received: Mutex<Vec<String>>,
    /// Request paths (with query) of completed handshakes
    requests: Mutex<Vec<String>>,
    /// Senders into every live connection
    peers: Mutex<Vec<mpsc::UnboundedSender<Message>>>,
    accepted: AtomicUsize,
    rejecting: AtomicBool,
    kick: Notify,
}

/// A mock WebSocket server that records what clients send
pub struct MockWsServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState::default());
        let shutdown = Arc::new(Notify::new());

        let accept_state = Arc::clone(&state);
        let accept_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                if accept_state.rejecting.load(Ordering::SeqCst) {
                                    // Dropping the socket fails the client handshake
                                    drop(stream);
                                    continue;
                                }
                                let state = Arc::clone(&accept_state);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, state).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = accept_shutdown.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            state,
            shutdown,
        }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, state: Arc<ServerState>) {
        use tokio_tungstenite::accept_hdr_async;
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

        let request_state = Arc::clone(&state);
        let callback = move |request: &Request,
                             response: Response|
              -> std::result::Result<Response, ErrorResponse> {
            request_state.requests.lock().push(request.uri().to_string());
            Ok(response)
        };

        let ws_stream = match accept_hdr_async(stream, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (push_tx, mut push_rx) = mpsc::unbounded_channel();
        state.peers.lock().push(push_tx);
        state.accepted.fetch_add(1, Ordering::SeqCst);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            state.received.lock().push(text);
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                frame = push_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if write.send(frame).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = state.kick.notified() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    /// Get the `host:port` of this server
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Number of completed WebSocket handshakes
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().clone()
    }

    /// Received frames parsed as JSON values
    pub fn received_json(&self) -> Vec<serde_json::Value> {
        self.received()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().clone()
    }

    /// Send a text frame to every connected client
    pub fn push_text(&self, text: &str) {
        self.state
            .peers
            .lock()
            .retain(|peer| peer.send(Message::Text(text.to_string())).is_ok());
    }

    /// Close every live connection from the server side
    pub fn drop_connections(&self) {
        self.state.peers.lock().clear();
        self.state.kick.notify_waiters();
    }

    /// Refuse (true) or accept (false) new handshakes
    pub fn set_rejecting(&self, rejecting: bool) {
        self.state.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.drop_connections();
        self.shutdown();
    }
}

/// The server side of one in-memory connection
pub struct RemoteEnd {
    /// Frames the client wrote
    pub outbound: fmpsc::UnboundedReceiver<WsMessage>,
    /// Frames to deliver to the client; dropping it closes the connection
    pub inbound: fmpsc::UnboundedSender<Result<WsMessage>>,
}

impl RemoteEnd {
    pub fn push_text(&self, text: &str) {
        let _ = self
            .inbound
            .unbounded_send(Ok(WsMessage::Text(text.to_string())));
    }

    /// Inject a transport error into the client's read half
    pub fn fail(&self, reason: &str) {
        let _ = self
            .inbound
            .unbounded_send(Err(LiveSocketError::WebSocket(reason.to_string())));
    }

    /// Frames written so far, without waiting
    pub fn drain_written(&mut self) -> Vec<WsMessage> {
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = self.outbound.try_next() {
            frames.push(frame);
        }
        frames
    }
}

/// What a scripted connection attempt does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fail right away
    Refuse,
    /// Hand back an open in-memory transport
    Accept,
    /// Open, but every write after the first `n` fails
    AcceptWritingAtMost(usize),
    /// Never answer
    Hang,
}

impl From<bool> for Outcome {
    fn from(succeed: bool) -> Self {
        if succeed {
            Outcome::Accept
        } else {
            Outcome::Refuse
        }
    }
}

struct Script {
    /// Outcome of upcoming attempts
    outcomes: VecDeque<Outcome>,
    /// Outcome once the script runs out
    fallback: Outcome,
}

/// Client write half that breaks after a fixed number of frames
struct LimitedSink {
    tx: fmpsc::UnboundedSender<WsMessage>,
    remaining: usize,
}

impl Sink<WsMessage> for LimitedSink {
    type Error = LiveSocketError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        if self.remaining == 0 {
            return Poll::Ready(Err(LiveSocketError::WebSocket("broken pipe".to_string())));
        }
        Poll::Ready(Ok(()))
    }

    fn start_send(mut self: Pin<&mut Self>, item: WsMessage) -> Result<()> {
        self.remaining = self.remaining.saturating_sub(1);
        self.tx
            .unbounded_send(item)
            .map_err(|e| LiveSocketError::WebSocket(e.to_string()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.tx.close_channel();
        Poll::Ready(Ok(()))
    }
}

/// A connector whose attempts succeed or fail on cue
///
/// Every attempt reports its (tokio) start time on a channel so paused-clock
/// tests can measure exact gaps between attempts.
#[derive(Clone)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
    attempts: mpsc::UnboundedSender<tokio::time::Instant>,
    remotes: mpsc::UnboundedSender<RemoteEnd>,
    connects: Arc<AtomicUsize>,
}

/// Test-side handle paired with a [`ScriptedConnector`]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
    pub attempts: mpsc::UnboundedReceiver<tokio::time::Instant>,
    pub remotes: mpsc::UnboundedReceiver<RemoteEnd>,
    connects: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    /// Connector that fails every attempt until told otherwise
    pub fn failing() -> (Self, ScriptHandle) {
        Self::with_outcomes(Vec::new(), false)
    }

    /// Connector that succeeds every attempt
    pub fn succeeding() -> (Self, ScriptHandle) {
        Self::with_outcomes(Vec::new(), true)
    }

    pub fn with_outcomes<O>(outcomes: Vec<O>, fallback: O) -> (Self, ScriptHandle)
    where
        O: Into<Outcome>,
    {
        let script = Arc::new(Mutex::new(Script {
            outcomes: outcomes.into_iter().map(Into::into).collect(),
            fallback: fallback.into(),
        }));
        let (attempts_tx, attempts_rx) = mpsc::unbounded_channel();
        let (remotes_tx, remotes_rx) = mpsc::unbounded_channel();
        let connects = Arc::new(AtomicUsize::new(0));

        let connector = Self {
            script: Arc::clone(&script),
            attempts: attempts_tx,
            remotes: remotes_tx,
            connects: Arc::clone(&connects),
        };
        let handle = ScriptHandle {
            script,
            attempts: attempts_rx,
            remotes: remotes_rx,
            connects,
        };
        (connector, handle)
    }
}

impl ScriptHandle {
    /// Outcome for attempts after the scripted ones
    pub fn set_fallback(&self, outcome: impl Into<Outcome>) {
        self.script.lock().fallback = outcome.into();
    }

    /// Total number of `connect` calls so far
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub async fn next_attempt(&mut self) -> tokio::time::Instant {
        self.attempts.recv().await.unwrap()
    }

    pub async fn next_remote(&mut self) -> RemoteEnd {
        self.remotes.recv().await.unwrap()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<Transport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let _ = self.attempts.send(tokio::time::Instant::now());

        let outcome = {
            let mut script = self.script.lock();
            let fallback = script.fallback;
            script.outcomes.pop_front().unwrap_or(fallback)
        };
        let write_limit = match outcome {
            Outcome::Refuse => {
                return Err(LiveSocketError::WebSocket("connection refused".to_string()))
            }
            Outcome::Hang => return futures::future::pending().await,
            Outcome::Accept => None,
            Outcome::AcceptWritingAtMost(n) => Some(n),
        };

        let (outbound_tx, outbound_rx) = fmpsc::unbounded();
        let (inbound_tx, inbound_rx) = fmpsc::unbounded();
        let _ = self.remotes.send(RemoteEnd {
            outbound: outbound_rx,
            inbound: inbound_tx,
        });

        match write_limit {
            Some(remaining) => {
                let sink = LimitedSink {
                    tx: outbound_tx,
                    remaining,
                };
                Ok(Transport::new(Box::pin(sink), Box::pin(inbound_rx)))
            }
            None => {
                let sink = outbound_tx.sink_map_err(|e| LiveSocketError::WebSocket(e.to_string()));
                Ok(Transport::new(Box::pin(sink), Box::pin(inbound_rx)))
            }
        }
    }
}

/// A well-formed inbound frame
pub fn frame(kind: &str, payload: serde_json::Value) -> String {
    serde_json::json!({
        "sender": "server",
        "receiver": "*",
        "timestamp": "2024-05-01T09:30:00Z",
        "type": kind,
        "payload": payload,
    })
    .to_string()
}
