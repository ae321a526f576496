pub mod states;

use crate::client::LiveSocket;
use crate::config::{ClientConfig, DEFAULT_HANDSHAKE_TIMEOUT};
use crate::endpoint::{generate_client_id, Endpoint};
use crate::traits::*;
use crate::ws_connector::TungsteniteConnector;
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`LiveSocket`]
///
/// The endpoint is the only required field; `build()` does not exist until
/// it has been set.
pub struct LiveSocketBuilder<E>
where
    E: EndpointState,
{
    _state: TypeState<E>,
    endpoint: Option<Endpoint>,
    client_id: Option<String>,
    connector: Option<Arc<dyn Connector>>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    max_queue_len: Option<usize>,
    handshake_timeout: Duration,
}

impl LiveSocketBuilder<NoEndpoint> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            endpoint: None,
            client_id: None,
            connector: None,
            reconnect_strategy: None,
            max_queue_len: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn endpoint(self, endpoint: Endpoint) -> LiveSocketBuilder<HasEndpoint> {
        LiveSocketBuilder {
            _state: TypeState::new(),
            endpoint: Some(endpoint),
            client_id: self.client_id,
            connector: self.connector,
            reconnect_strategy: self.reconnect_strategy,
            max_queue_len: self.max_queue_len,
            handshake_timeout: self.handshake_timeout,
        }
    }

    /// Shorthand for a plain `ws://` endpoint on `host`
    pub fn host(self, host: impl Into<String>) -> LiveSocketBuilder<HasEndpoint> {
        self.endpoint(Endpoint::new(host))
    }
}

impl Default for LiveSocketBuilder<NoEndpoint> {
    fn default() -> Self {
        Self::new()
    }
}

// Optional configuration methods
impl<E> LiveSocketBuilder<E>
where
    E: EndpointState,
{
    /// Use a fixed client identifier instead of a generated UUID
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Replace the default tokio-tungstenite transport
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Bound the outbound queue; the oldest message is evicted when full
    pub fn max_queue_len(mut self, max: usize) -> Self {
        self.max_queue_len = Some(max);
        self
    }

    /// Give up on a connection attempt after `timeout` and back off
    ///
    /// Applies to every connector. Defaults to 10 seconds.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

// Build method - only available once the endpoint is set
impl LiveSocketBuilder<HasEndpoint> {
    /// Resolve the URL and start the connection loop
    ///
    /// Must be called from within a tokio runtime. The loop starts idle: no
    /// connection is opened until `connect()` or the first `send()`.
    pub fn build(self) -> Result<LiveSocket> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| LiveSocketError::Configuration("endpoint must be set".to_string()))?;

        if self.max_queue_len == Some(0) {
            return Err(LiveSocketError::Configuration(
                "max_queue_len must be greater than 0".to_string(),
            ));
        }

        if self.handshake_timeout.is_zero() {
            return Err(LiveSocketError::Configuration(
                "handshake_timeout must be greater than 0".to_string(),
            ));
        }

        let client_id = self.client_id.unwrap_or_else(generate_client_id);
        let url = endpoint.resolve(&client_id)?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(TungsteniteConnector));
        let reconnect_strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(ExponentialBackoff::default()));

        let config = ClientConfig {
            url,
            client_id,
            connector,
            reconnect_strategy,
            max_queue_len: self.max_queue_len,
            handshake_timeout: self.handshake_timeout,
        };

        LiveSocket::new(config)
    }
}
