//! Client registry and message routing
//!
//! Every connected client owns a bounded outbound buffer. Routing never
//! blocks: a client whose buffer is full or whose write pump is gone is
//! unregistered on the spot, which closes its connection.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use livesocket::Message;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default capacity of each client's outbound buffer
pub const DEFAULT_CLIENT_BUFFER: usize = 16;

/// Default capacity of the incoming observation channel
pub const DEFAULT_INCOMING_BUFFER: usize = 32;

/// Identifies one connection (a client id may be connected more than once)
pub type ConnectionId = u64;

struct ClientEntry {
    client_id: String,
    tx: mpsc::Sender<Message>,
}

/// Registry of connected clients
pub struct Hub {
    clients: RwLock<HashMap<ConnectionId, ClientEntry>>,
    next_id: AtomicU64,
    client_buffer: usize,
    incoming_tx: Sender<Message>,
    incoming_rx: Receiver<Message>,
}

impl Hub {
    pub fn new(client_buffer: usize, incoming_buffer: usize) -> Self {
        let (incoming_tx, incoming_rx) = bounded(incoming_buffer.max(1));
        Self {
            clients: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            client_buffer: client_buffer.max(1),
            incoming_tx,
            incoming_rx,
        }
    }

    /// Add a client, returning its connection id and the receiving end of
    /// its outbound buffer
    pub fn register(&self, client_id: impl Into<String>) -> (ConnectionId, mpsc::Receiver<Message>) {
        let client_id = client_id.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.client_buffer);

        let count = {
            let mut clients = self.clients.write();
            clients.insert(
                id,
                ClientEntry {
                    client_id: client_id.clone(),
                    tx,
                },
            );
            clients.len()
        };
        info!(client_id = %client_id, connection = id, clients = count, "Client registered");

        (id, rx)
    }

    /// Remove a client; dropping its buffer sender ends its write pump
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.clients.write().remove(&id);
        match removed {
            Some(entry) => {
                info!(client_id = %entry.client_id, connection = id, "Client unregistered");
                true
            }
            None => false,
        }
    }

    /// Unregister every client
    pub fn close_all(&self) {
        let drained: Vec<_> = self.clients.write().drain().collect();
        if !drained.is_empty() {
            info!(clients = drained.len(), "Closing all client connections");
        }
    }

    /// Route a message to its recipients
    ///
    /// An empty timestamp is filled with the current time. A receiver of ""
    /// or `*` reaches every client, any other value only the clients with
    /// that id. Returns the number of clients the message was queued for.
    pub fn send_message(&self, mut message: Message) -> usize {
        if message.timestamp.is_empty() {
            message.timestamp = now_rfc3339();
        }

        let mut delivered = 0;
        let mut evict = Vec::new();
        {
            let clients = self.clients.read();
            for (id, entry) in clients.iter() {
                if !message.is_addressed_to(&entry.client_id) {
                    continue;
                }
                match entry.tx.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(client_id = %entry.client_id, "Client buffer full, dropping client");
                        evict.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!(client_id = %entry.client_id, "Client write pump gone");
                        evict.push(*id);
                    }
                }
            }
        }

        for id in evict {
            self.unregister(id);
        }

        debug!(
            message_type = %message.kind,
            receiver = %message.receiver,
            delivered,
            "Message routed"
        );
        delivered
    }

    /// Publish an inbound client message for observers, dropping it if the
    /// channel is full
    pub fn publish_incoming(&self, message: Message) -> bool {
        match self.incoming_tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                debug!(message_type = %message.kind, "Incoming channel full, dropping observation");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Stream of messages received from clients
    pub fn incoming(&self) -> Receiver<Message> {
        self.incoming_rx.clone()
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Ids of connected clients (sorted, one entry per connection)
    pub fn client_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .clients
            .read()
            .values()
            .map(|entry| entry.client_id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_BUFFER, DEFAULT_INCOMING_BUFFER)
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("clients", &self.client_count())
            .field("client_buffer", &self.client_buffer)
            .finish()
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
