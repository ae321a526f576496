use thiserror::Error;

/// Main error type for livesocket
///
/// Only construction and transport plumbing ever produce these. The public
/// `connect`/`send`/`subscribe` surface recovers from every runtime failure
/// on its own and never hands one of these back to the caller.
#[derive(Error, Debug)]
pub enum LiveSocketError {
    /// WebSocket transport error (handshake, read or write)
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Inbound frame could not be decoded into a message
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Outbound message could not be encoded
    #[error("Encode error: {0}")]
    EncodeError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The service has been shut down
    #[error("Service shut down")]
    ShutDown,
}

impl From<serde_json::Error> for LiveSocketError {
    fn from(err: serde_json::Error) -> Self {
        LiveSocketError::ParseError(err.to_string())
    }
}

impl From<url::ParseError> for LiveSocketError {
    fn from(err: url::ParseError) -> Self {
        LiveSocketError::Configuration(format!("invalid endpoint: {}", err))
    }
}

/// Result type for livesocket operations
pub type Result<T> = std::result::Result<T, LiveSocketError>;
