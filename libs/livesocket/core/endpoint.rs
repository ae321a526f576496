//! Endpoint resolution
//!
//! The connection URL has the shape
//! `<ws|wss>://<host>/api/ws?clientId=<id>`. It is resolved once when the
//! service is built and reused for every reconnect.

use crate::error::{LiveSocketError, Result};
use url::Url;
use uuid::Uuid;

/// Default WebSocket path on the console server
pub const DEFAULT_PATH: &str = "/api/ws";

/// Query parameter carrying the client identifier
pub const CLIENT_ID_PARAM: &str = "clientId";

/// Where the server lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    secure: bool,
    path: String,
}

impl Endpoint {
    /// Plain `ws://` endpoint on `host` (`name` or `name:port`)
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            secure: false,
            path: DEFAULT_PATH.to_string(),
        }
    }

    /// Derive the endpoint from a page origin such as `https://console.example.com`
    ///
    /// The WebSocket scheme mirrors the origin's transport security.
    pub fn from_origin(origin: &str) -> Result<Self> {
        let parsed = Url::parse(origin)?;
        let secure = match parsed.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => {
                return Err(LiveSocketError::Configuration(format!(
                    "unsupported origin scheme '{}'",
                    other
                )))
            }
        };
        let host = parsed.host_str().ok_or_else(|| {
            LiveSocketError::Configuration(format!("origin '{}' has no host", origin))
        })?;
        let host = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self::new(host).secure(secure))
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Build the full connection URL for `client_id`
    pub fn resolve(&self, client_id: &str) -> Result<String> {
        if self.host.is_empty() || self.host.contains(['/', '?', '#']) {
            return Err(LiveSocketError::Configuration(format!(
                "invalid host '{}'",
                self.host
            )));
        }
        if client_id.is_empty() {
            return Err(LiveSocketError::Configuration(
                "client id must not be empty".to_string(),
            ));
        }

        let scheme = if self.secure { "wss" } else { "ws" };
        let mut url = Url::parse(&format!("{}://{}", scheme, self.host))?;
        url.set_path(&self.path);
        url.query_pairs_mut().append_pair(CLIENT_ID_PARAM, client_id);

        Ok(url.into())
    }
}

/// Fresh random client identifier
pub fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}
