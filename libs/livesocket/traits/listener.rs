//! Inbound message listeners
//!
//! Every successfully decoded inbound message is handed to every registered
//! listener exactly once. Listeners run on the connection loop itself, one
//! message at a time in wire-arrival order, so they must not block. A
//! listener is free to call `send`, `subscribe` or unsubscribe from inside
//! its callback.

use crate::core::message::Message;

/// Receives inbound messages
///
/// Implemented for any `Fn(&Message) + Send + Sync` closure, so most callers
/// never implement this by hand.
///
/// # Example
///
/// ```ignore
/// let subscription = socket.subscribe(|message: &Message| {
///     if message.kind == "server-tick" {
///         println!("tick: {}", message.payload);
///     }
/// });
///
/// // Later
/// subscription.unsubscribe();
/// ```
pub trait MessageListener: Send + Sync + 'static {
    /// Handle one inbound message
    ///
    /// A panic raised here is caught and logged; other listeners still
    /// receive the message and the connection stays up.
    fn on_message(&self, message: &Message);
}

impl<F> MessageListener for F
where
    F: Fn(&Message) + Send + Sync + 'static,
{
    fn on_message(&self, message: &Message) {
        self(message)
    }
}
