//! Settings for the demo client and the relay hub
//!
//! Both are read from YAML, then selected fields are overridden from the
//! environment (after loading `.env`), then validated.

use livesocket::{Endpoint, ExponentialBackoff, LiveSocket};
use relayhub::HubOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Overrides `ClientSettings::host`
pub const HOST_ENV: &str = "LIVESOCKET_HOST";

/// Overrides `HubSettings::addr`
pub const HUB_ADDR_ENV: &str = "RELAY_HUB_ADDR";

const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Demo client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Server `host[:port]`
    pub host: String,
    /// Use wss:// instead of ws://
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_path")]
    pub path: String,
    /// Fixed client id; a UUID is generated when absent
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    /// Connection attempts taking longer than this fail and back off
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Bound on the outbound queue; unbounded when absent
    #[serde(default)]
    pub max_queue_len: Option<usize>,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Relay hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,
    #[serde(default = "default_incoming_buffer")]
    pub incoming_buffer: usize,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_demo_interval_ms")]
    pub demo_interval_ms: u64,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_path() -> String {
    livesocket::DEFAULT_PATH.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_handshake_timeout_ms() -> u64 {
    livesocket::DEFAULT_HANDSHAKE_TIMEOUT.as_millis() as u64
}

fn default_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_client_buffer() -> usize {
    relayhub::DEFAULT_CLIENT_BUFFER
}

fn default_incoming_buffer() -> usize {
    relayhub::DEFAULT_INCOMING_BUFFER
}

fn default_max_frame_bytes() -> usize {
    5120
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    60
}

fn default_demo_interval_ms() -> u64 {
    1000
}

fn validate_log_level(level: &str) -> Result<()> {
    if !VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "log_level must be one of: {}",
            VALID_LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}

impl ClientSettings {
    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: ClientSettings = serde_yaml::from_str(&yaml_content)?;

        dotenv::dotenv().ok();
        if let Ok(host) = std::env::var(HOST_ENV) {
            info!("Overriding host from environment variable");
            config.host = host;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate without touching files or the environment
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ClientSettings = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError("host cannot be empty".to_string()));
        }
        if !self.path.starts_with('/') {
            return Err(ConfigError::ValidationError("path must start with '/'".to_string()));
        }
        if self.reconnect.initial_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "reconnect.initial_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            return Err(ConfigError::ValidationError(
                "reconnect.max_delay_ms must be at least reconnect.initial_delay_ms".to_string(),
            ));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "handshake_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_queue_len == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_queue_len must be greater than 0".to_string(),
            ));
        }
        if matches!(&self.client_id, Some(id) if id.is_empty()) {
            return Err(ConfigError::ValidationError("client_id cannot be empty".to_string()));
        }
        validate_log_level(&self.log_level)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Host: {} ({})", self.host, if self.secure { "wss" } else { "ws" });
        info!("  Path: {}", self.path);
        info!("  Client id: {}", self.client_id.as_deref().unwrap_or("<generated>"));
        info!(
            "  Reconnect: {}ms doubling, capped at {}ms",
            self.reconnect.initial_delay_ms, self.reconnect.max_delay_ms
        );
        info!("  Handshake timeout: {}ms", self.handshake_timeout_ms);
        match self.max_queue_len {
            Some(max) => info!("  Outbound queue: bounded at {}", max),
            None => info!("  Outbound queue: unbounded"),
        }
        info!("  Log level: {}", self.log_level);
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone())
            .secure(self.secure)
            .path(self.path.clone())
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.reconnect.initial_delay_ms),
            Duration::from_millis(self.reconnect.max_delay_ms),
        )
    }

    /// Build a client from these settings (inside a tokio runtime)
    pub fn build_socket(&self) -> livesocket::Result<LiveSocket> {
        let mut builder = LiveSocket::builder()
            .endpoint(self.endpoint())
            .reconnect_strategy(self.backoff())
            .handshake_timeout(Duration::from_millis(self.handshake_timeout_ms));
        if let Some(client_id) = &self.client_id {
            builder = builder.client_id(client_id.clone());
        }
        if let Some(max) = self.max_queue_len {
            builder = builder.max_queue_len(max);
        }
        builder.build()
    }
}

impl HubSettings {
    /// Load configuration from YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: HubSettings = serde_yaml::from_str(&yaml_content)?;

        dotenv::dotenv().ok();
        if let Ok(addr) = std::env::var(HUB_ADDR_ENV) {
            info!("Overriding listen address from environment variable");
            config.addr = addr;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: HubSettings = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.addr.trim().is_empty() {
            return Err(ConfigError::ValidationError("addr cannot be empty".to_string()));
        }
        if !self.path.starts_with('/') {
            return Err(ConfigError::ValidationError("path must start with '/'".to_string()));
        }
        for (name, value) in [
            ("client_buffer", self.client_buffer),
            ("incoming_buffer", self.incoming_buffer),
            ("max_frame_bytes", self.max_frame_bytes),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        if self.ping_interval_secs == 0 || self.read_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "ping_interval_secs and read_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.ping_interval_secs >= self.read_timeout_secs {
            return Err(ConfigError::ValidationError(
                "ping_interval_secs must be shorter than read_timeout_secs".to_string(),
            ));
        }
        if self.demo_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "demo_interval_ms must be greater than 0".to_string(),
            ));
        }
        validate_log_level(&self.log_level)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Listen address: {}", self.addr);
        info!("  Path: {}", self.path);
        info!(
            "  Buffers: {} per client, {} incoming",
            self.client_buffer, self.incoming_buffer
        );
        info!("  Max frame: {} bytes", self.max_frame_bytes);
        info!(
            "  Ping every {}s, read timeout {}s",
            self.ping_interval_secs, self.read_timeout_secs
        );
        info!("  Demo tick interval: {}ms", self.demo_interval_ms);
        info!("  Log level: {}", self.log_level);
    }

    pub fn options(&self) -> HubOptions {
        HubOptions {
            path: self.path.clone(),
            client_buffer: self.client_buffer,
            incoming_buffer: self.incoming_buffer,
            max_frame_bytes: self.max_frame_bytes,
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            demo_interval: Duration::from_millis(self.demo_interval_ms),
        }
    }
}
