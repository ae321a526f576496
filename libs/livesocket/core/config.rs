use crate::traits::*;
use std::sync::Arc;
use std::time::Duration;

/// How long one connection attempt may take before it counts as failed
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a [`LiveSocket`](crate::LiveSocket)
///
/// Built by the type-state builder; the URL is already resolved, so every
/// reconnect of the service targets the same endpoint and client id.
pub struct ClientConfig {
    /// Fully resolved connection URL (ws:// or wss://, includes clientId)
    pub(crate) url: String,

    /// Client identifier embedded in the URL
    pub(crate) client_id: String,

    /// Transport factory
    pub(crate) connector: Arc<dyn Connector>,

    /// Delay policy between reconnects
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Optional bound on the outbound queue (None = unbounded)
    pub(crate) max_queue_len: Option<usize>,

    /// Deadline for the connector to hand back an open transport
    pub(crate) handshake_timeout: Duration,
}

impl ClientConfig {
    /// Get a reference to the URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("client_id", &self.client_id)
            .field("max_queue_len", &self.max_queue_len)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}
