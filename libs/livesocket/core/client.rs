use crate::config::ClientConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
use crate::dispatcher::{Dispatcher, Subscription};
use crate::message::{Message, OutboundMessage};
use crate::outbound::{OutboundQueue, Stamper};
use crate::traits::*;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use futures::future::{self, BoxFuture};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

/// Capacity of the lifecycle event channel; events beyond it are discarded
const EVENT_BUFFER: usize = 1024;

/// Commands from handles to the connection loop
#[derive(Debug)]
enum Command {
    Connect,
    Send(OutboundMessage),
    Shutdown,
}

/// Lifecycle notifications emitted by the connection loop
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A connection attempt started (`attempt` reconnects since last open)
    Connecting { attempt: u32 },
    /// The connection is open and the queue has been flushed
    Connected,
    /// The connection was lost or could not be established
    Disconnected { reason: String },
    /// The `attempt`-th reconnect will fire after `delay`
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// An inbound frame could not be decoded and was discarded
    FrameDropped { reason: String },
    /// The bounded outbound queue evicted its oldest message
    MessageEvicted { kind: String },
    /// The service stopped
    ShutDown,
}

/// Resilient WebSocket messaging client
///
/// One `LiveSocket` owns one logical connection. Clones are cheap handles to
/// the same service, so a single instance can be shared across the whole
/// application.
///
/// - `connect()` is idempotent and never fails; establishment errors are
///   logged and retried with backoff forever
/// - `send()` transmits immediately when open, otherwise queues; queued
///   messages are flushed in order on the next open
/// - `subscribe()` registers listeners for every inbound message
///
/// All connection events, timer expiries and commands are handled one at a
/// time by a single tokio task that exclusively owns the connection, the
/// queue and the reconnect timer.
#[derive(Clone)]
pub struct LiveSocket {
    shared: Arc<Shared>,
}

struct Shared {
    url: String,
    client_id: String,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    dispatcher: Dispatcher,
    command_tx: mpsc::UnboundedSender<Command>,
    event_rx: Receiver<ClientEvent>,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Flips to `true` once the loop has finished shutting down
    stopped: watch::Receiver<bool>,
}

/// Non-owning handle to a [`LiveSocket`]
///
/// Listeners that reply through the socket hold one of these. A strong
/// clone captured by a listener would keep the service alive through its
/// own dispatcher.
#[derive(Clone)]
pub struct WeakLiveSocket {
    shared: Weak<Shared>,
}

impl WeakLiveSocket {
    pub fn upgrade(&self) -> Option<LiveSocket> {
        self.shared.upgrade().map(|shared| LiveSocket { shared })
    }

    /// Submit a message if the service still exists
    ///
    /// Returns `false` when every strong handle has been dropped.
    pub fn send(&self, message: OutboundMessage) -> bool {
        match self.upgrade() {
            Some(socket) => {
                socket.send(message);
                true
            }
            None => false,
        }
    }
}

impl LiveSocket {
    /// Start building a client
    pub fn builder() -> crate::builder::LiveSocketBuilder<crate::builder::states::NoEndpoint> {
        crate::builder::LiveSocketBuilder::new()
    }

    /// Spawn the connection loop for `config`
    ///
    /// Called by the builder's `build()`.
    pub(crate) fn new(config: ClientConfig) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            LiveSocketError::Configuration("LiveSocket must be built inside a tokio runtime".into())
        })?;

        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Closed));
        let metrics = Arc::new(AtomicMetrics::new());
        let dispatcher = Dispatcher::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = bounded(EVENT_BUFFER);
        let (stopped_tx, stopped_rx) = watch::channel(false);

        let url = config.url.clone();
        let client_id = config.client_id.clone();

        let connection_loop = ConnectionLoop {
            queue: OutboundQueue::new(config.max_queue_len),
            config,
            state: Arc::clone(&state),
            metrics: Arc::clone(&metrics),
            dispatcher: dispatcher.clone(),
            events: event_tx,
            commands: command_rx,
            stamper: Stamper::new(),
            attempts: 0,
            connecting: None,
            transport: None,
            reconnect_timer: None,
            stopped: stopped_tx,
        };
        let task_handle = runtime.spawn(connection_loop.run());

        Ok(Self {
            shared: Arc::new(Shared {
                url,
                client_id,
                state,
                metrics,
                dispatcher,
                command_tx,
                event_rx,
                task_handle: Mutex::new(Some(task_handle)),
                stopped: stopped_rx,
            }),
        })
    }

    /// Handle that does not keep the service alive
    pub fn downgrade(&self) -> WeakLiveSocket {
        WeakLiveSocket {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Ensure the connection is open or opening
    ///
    /// No-op while a connection is open or an attempt is in flight.
    pub fn connect(&self) {
        if self.shared.command_tx.send(Command::Connect).is_err() {
            warn!("connect() called after shutdown, ignoring");
        }
    }

    /// Submit a message for delivery
    ///
    /// Sent right away when the connection is open, queued otherwise. The
    /// first send on an idle service also opens the connection.
    pub fn send(&self, message: OutboundMessage) {
        if let Err(mpsc::error::SendError(Command::Send(message))) =
            self.shared.command_tx.send(Command::Send(message))
        {
            warn!(
                message_type = %message.kind,
                "send() called after shutdown, message not delivered"
            );
        }
    }

    /// Register a listener for inbound messages
    pub fn subscribe<L>(&self, listener: L) -> Subscription
    where
        L: MessageListener,
    {
        self.shared.dispatcher.subscribe(listener)
    }

    /// Receive inbound messages through a channel instead of a callback
    pub fn subscribe_channel(&self) -> (Subscription, Receiver<Message>) {
        self.shared.dispatcher.subscribe_channel()
    }

    /// Get current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Check if the connection is open
    #[inline]
    pub fn is_open(&self) -> bool {
        self.shared.state.is_open()
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        self.shared.metrics.snapshot(self.shared.state.get())
    }

    /// Number of messages waiting for an open connection
    pub fn queued(&self) -> usize {
        self.shared.metrics.queued()
    }

    /// Resolved connection URL
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.shared.dispatcher.listener_count()
    }

    /// Try to receive a lifecycle event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.shared.event_rx.try_recv().ok()
    }

    /// Receive a lifecycle event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ClientEvent, crossbeam_channel::RecvError> {
        self.shared.event_rx.recv()
    }

    /// Clone of the lifecycle event receiver
    ///
    /// Every receiver handed out here, `try_recv_event` and `recv_event` drain
    /// the same queue, across all clones of the socket: each event is taken
    /// by exactly one consumer. Keep a single consumer when every event
    /// matters.
    pub fn events(&self) -> Receiver<ClientEvent> {
        self.shared.event_rx.clone()
    }

    /// Stop the service
    ///
    /// Cancels the pending reconnect, closes the connection and waits for the
    /// loop to exit. Messages still queued are logged and discarded. Safe to
    /// call more than once and from any clone.
    pub async fn shutdown(&self) {
        info!("Shutting down LiveSocket");
        let _ = self.shared.command_tx.send(Command::Shutdown);

        let handle = self.shared.task_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Connection loop ended abnormally: {}", e);
            }
        }

        // Other callers wait here; a dropped sender means the task is gone too
        let mut stopped = self.shared.stopped.clone();
        let _ = stopped.wait_for(|stopped| *stopped).await;
    }
}

impl std::fmt::Debug for LiveSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSocket")
            .field("url", &self.shared.url)
            .field("state", &self.shared.state.get())
            .finish()
    }
}

/// One turn of the connection loop
enum Turn {
    Command(Option<Command>),
    Established(Result<Transport>),
    Inbound(Option<Result<WsMessage>>),
    ReconnectDue,
}

/// The task that owns the connection
///
/// State transitions:
/// - `Closed -> Connecting`: `connect()`, lazy send, or the reconnect timer
/// - `Connecting -> Open`: transport established; counter reset, queue flushed
/// - `Connecting -> Closed`: establishment failed; reconnect scheduled
/// - `Open -> Closed`: peer closed, read error or write error; reconnect scheduled
struct ConnectionLoop {
    config: ClientConfig,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    dispatcher: Dispatcher,
    events: Sender<ClientEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    queue: OutboundQueue,
    stamper: Stamper,
    /// Reconnects fired since the last successful open
    attempts: u32,
    connecting: Option<BoxFuture<'static, Result<Transport>>>,
    transport: Option<Transport>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    stopped: watch::Sender<bool>,
}

impl ConnectionLoop {
    async fn run(mut self) {
        debug!(url = %self.config.url, "Connection loop started");

        loop {
            let turn = tokio::select! {
                command = self.commands.recv() => Turn::Command(command),
                result = next_established(&mut self.connecting) => Turn::Established(result),
                frame = next_frame(&mut self.transport) => Turn::Inbound(frame),
                _ = next_timer(&mut self.reconnect_timer) => Turn::ReconnectDue,
            };

            match turn {
                Turn::Command(Some(Command::Connect)) => self.connect(),
                Turn::Command(Some(Command::Send(message))) => self.send(message).await,
                Turn::Command(Some(Command::Shutdown)) | Turn::Command(None) => break,
                Turn::Established(result) => {
                    self.connecting = None;
                    self.on_established(result).await;
                }
                Turn::Inbound(Some(Ok(frame))) => self.on_frame(frame),
                Turn::Inbound(Some(Err(e))) => self.on_transport_error(e).await,
                Turn::Inbound(None) => self.on_closed("connection closed by peer".to_string()),
                Turn::ReconnectDue => {
                    self.reconnect_timer = None;
                    self.on_reconnect_due();
                }
            }
        }

        self.shut_down().await;
    }

    fn emit(&self, event: ClientEvent) {
        match self.events.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                debug!(?event, "Event channel full, dropping event");
            }
        }
    }

    fn connect(&mut self) {
        match self.state.get() {
            ConnectionState::Open | ConnectionState::Connecting => {
                debug!("Already open or connecting, skipping connect");
                return;
            }
            ConnectionState::Closed | ConnectionState::ShutDown => {}
        }

        if self.reconnect_timer.take().is_some() {
            debug!("Pending reconnect cancelled by explicit connect");
        }

        self.state.set(ConnectionState::Connecting);
        self.emit(ClientEvent::Connecting {
            attempt: self.attempts,
        });
        debug!(url = %self.config.url, attempt = self.attempts, "Opening connection");

        let connector = Arc::clone(&self.config.connector);
        let url = self.config.url.clone();
        let deadline = self.config.handshake_timeout;
        self.connecting = Some(Box::pin(async move {
            match tokio::time::timeout(deadline, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(LiveSocketError::WebSocket("handshake timed out".to_string())),
            }
        }));
    }

    async fn on_established(&mut self, result: Result<Transport>) {
        match result {
            Ok(transport) => {
                info!("Connected to {}", self.config.url);
                self.transport = Some(transport);
                self.state.set(ConnectionState::Open);
                self.attempts = 0;
                self.flush().await;
                if self.state.is_open() {
                    self.emit(ClientEvent::Connected);
                }
            }
            Err(e) => {
                error!("Failed to open websocket: {}", e);
                self.state.set(ConnectionState::Closed);
                self.emit(ClientEvent::Disconnected {
                    reason: e.to_string(),
                });
                self.schedule_reconnect();
            }
        }
    }

    fn on_frame(&mut self, frame: WsMessage) {
        match Message::decode(&frame) {
            Ok(message) => {
                self.metrics.increment_received();
                debug!(
                    message_type = %message.kind,
                    sender = %message.sender,
                    "Inbound message"
                );
                self.dispatcher.dispatch(&message);
            }
            Err(e) => {
                self.metrics.increment_dropped();
                error!("Unable to parse websocket message: {}", e);
                self.emit(ClientEvent::FrameDropped {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Runtime transport failure: force the transport closed, then take the
    /// regular close path (which schedules exactly one reconnect)
    async fn on_transport_error(&mut self, e: LiveSocketError) {
        error!("WebSocket error: {}", e);
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.sink.close().await;
        }
        self.on_closed(e.to_string());
    }

    fn on_closed(&mut self, reason: String) {
        self.transport = None;
        self.state.set(ConnectionState::Closed);
        warn!("WebSocket closed: {}", reason);
        self.emit(ClientEvent::Disconnected { reason });
        self.schedule_reconnect();
    }

    /// Arm the reconnect timer, replacing any pending one
    fn schedule_reconnect(&mut self) {
        let delay = self.config.reconnect_strategy.next_delay(self.attempts);
        let attempt = self.attempts.saturating_add(1);

        if self.reconnect_timer.is_some() {
            debug!("Replacing pending reconnect timer");
        }
        self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));

        info!("Reconnecting in {:?} (attempt {})", delay, attempt);
        self.emit(ClientEvent::ReconnectScheduled { attempt, delay });
    }

    fn on_reconnect_due(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
        self.metrics.increment_reconnects();
        self.connect();
    }

    async fn send(&mut self, message: OutboundMessage) {
        if self.state.is_open() {
            self.transmit(message).await;
            return;
        }

        if let Some(evicted) = self.queue.push_back(message) {
            self.emit(ClientEvent::MessageEvicted { kind: evicted.kind });
        }
        self.metrics.set_queued(self.queue.len());
        debug!(queued = self.queue.len(), "Websocket not open, message queued");

        let idle = self.state.get() == ConnectionState::Closed
            && self.connecting.is_none()
            && self.reconnect_timer.is_none();
        if idle {
            debug!("Send on idle connection, connecting");
            self.connect();
        }
    }

    /// Write one message to the open transport
    ///
    /// On a write failure the message goes back to the head of the queue and
    /// the connection takes the close path. Returns whether it was written.
    async fn transmit(&mut self, message: OutboundMessage) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            self.queue.push_front(message);
            self.metrics.set_queued(self.queue.len());
            return false;
        };

        let stamped = self.stamper.stamp(message.clone());
        let frame = match stamped.encode() {
            Ok(frame) => frame,
            Err(e) => {
                self.metrics.increment_dropped();
                error!(message_type = %stamped.kind, "Dropping message that cannot be encoded: {}", e);
                return true;
            }
        };

        let result = transport.sink.send(frame).await;
        match result {
            Ok(()) => {
                self.metrics.increment_sent();
                debug!(
                    message_type = %stamped.kind,
                    timestamp = %stamped.timestamp,
                    "Message sent"
                );
                true
            }
            Err(e) => {
                self.queue.push_front(message);
                self.metrics.set_queued(self.queue.len());
                self.on_transport_error(e).await;
                false
            }
        }
    }

    /// Drain the queue head to tail while the connection stays open
    async fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        info!("Flushing {} queued message(s)", self.queue.len());

        while self.state.is_open() {
            let Some(message) = self.queue.pop_front() else {
                break;
            };
            self.metrics.set_queued(self.queue.len());
            if !self.transmit(message).await {
                break;
            }
        }

        if !self.queue.is_empty() {
            warn!(
                remaining = self.queue.len(),
                "Flush interrupted, messages stay queued"
            );
        }
    }

    async fn shut_down(&mut self) {
        self.reconnect_timer = None;
        self.connecting = None;
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.sink.close().await {
                debug!("Error closing websocket during shutdown: {}", e);
            }
        }
        self.state.set(ConnectionState::ShutDown);

        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let Command::Send(message) = command {
                self.queue.push_back(message);
            }
        }
        if !self.queue.is_empty() {
            warn!(
                undelivered = self.queue.len(),
                "Shutting down with undelivered messages"
            );
        }
        self.metrics.set_queued(self.queue.len());

        self.emit(ClientEvent::ShutDown);
        self.stopped.send_replace(true);
        info!("Connection loop exiting");
    }
}

async fn next_established(
    slot: &mut Option<BoxFuture<'static, Result<Transport>>>,
) -> Result<Transport> {
    match slot.as_mut() {
        Some(connecting) => connecting.await,
        None => future::pending().await,
    }
}

async fn next_frame(slot: &mut Option<Transport>) -> Option<Result<WsMessage>> {
    match slot.as_mut() {
        Some(transport) => transport.stream.next().await,
        None => future::pending().await,
    }
}

async fn next_timer(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot.as_mut() {
        Some(timer) => timer.as_mut().await,
        None => future::pending().await,
    }
}
