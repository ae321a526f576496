//! Inbound fan-out
//!
//! Listeners are stored behind a `parking_lot::RwLock` so `subscribe` and
//! `unsubscribe` can be called from any thread, including from inside a
//! listener. Dispatch snapshots the listener set before invoking anything,
//! which keeps the lock out of user code.

use crate::core::message::Message;
use crate::traits::MessageListener;
use crossbeam_channel::{unbounded, Receiver};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

type ListenerId = u64;

#[derive(Default)]
struct Registry {
    listeners: RwLock<HashMap<ListenerId, Arc<dyn MessageListener>>>,
    next_id: AtomicU64,
}

/// Fans each inbound message out to every registered listener
#[derive(Clone, Default)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    ///
    /// The registration stays active until [`Subscription::unsubscribe`] is
    /// called. Dropping the returned handle does not unsubscribe.
    pub fn subscribe<L>(&self, listener: L) -> Subscription
    where
        L: MessageListener,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .write()
            .insert(id, Arc::new(listener));
        debug!(listener_id = id, "Listener subscribed");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Register a listener that forwards every message into a channel
    pub fn subscribe_channel(&self) -> (Subscription, Receiver<Message>) {
        let (tx, rx) = unbounded();
        let subscription = self.subscribe(move |message: &Message| {
            // Receiver gone means the consumer stopped reading
            let _ = tx.send(message.clone());
        });
        (subscription, rx)
    }

    /// Deliver `message` to every currently registered listener
    ///
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, message: &Message) -> usize {
        let snapshot: Vec<(ListenerId, Arc<dyn MessageListener>)> = self
            .registry
            .listeners
            .read()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in &snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_message(message)));
            if outcome.is_err() {
                error!(
                    listener_id = *id,
                    message_type = %message.kind,
                    "Listener panicked while handling message"
                );
            }
        }

        snapshot.len()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.listeners.read().len()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle to one listener registration
#[derive(Debug, Clone)]
pub struct Subscription {
    id: ListenerId,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove this registration
    ///
    /// Safe to call any number of times. Returns `true` only for the call
    /// that actually removed the listener.
    pub fn unsubscribe(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let removed = registry.listeners.write().remove(&self.id).is_some();
        if removed {
            debug!(listener_id = self.id, "Listener unsubscribed");
        }
        removed
    }

    /// Whether the listener is still registered
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.listeners.read().contains_key(&self.id))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}
