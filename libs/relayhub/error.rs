use thiserror::Error;

/// Errors raised by the relay hub
#[derive(Error, Debug)]
pub enum HubError {
    /// Binding or accepting on the listener failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Inbound frame is not a message envelope
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Invalid server options
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for HubError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        HubError::WebSocket(err.to_string())
    }
}

/// Result type for relay hub operations
pub type Result<T> = std::result::Result<T, HubError>;
