//! Command line handling for the binaries
//!
//! Usage: `<bin> [SETTINGS.yaml] [--addr HOST:PORT]`
//!
//! The settings file falls back to an environment variable, then to the file
//! shipped under `config/`. `--addr` replaces the server host (demo client)
//! or the listen address (relay hub) after the settings file is loaded.

use std::path::PathBuf;
use thiserror::Error;

/// Which binary is starting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// `ws_demo`, settings in config/client.yaml
    Client,
    /// `relay_hub`, settings in config/hub.yaml
    Hub,
}

impl Role {
    pub fn default_settings_path(&self) -> &'static str {
        match self {
            Role::Client => "config/client.yaml",
            Role::Hub => "config/hub.yaml",
        }
    }

    /// Environment variable that points at the settings file
    pub fn settings_env_var(&self) -> &'static str {
        match self {
            Role::Client => "CLIENT_CONFIG_PATH",
            Role::Hub => "HUB_CONFIG_PATH",
        }
    }

    /// Name used in the startup and shutdown banners
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Client => "WebSocket Demo",
            Role::Hub => "Relay Hub",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CliError {
    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("unexpected argument: {0}")]
    Unexpected(String),
}

/// Parsed command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Settings file given on the command line
    pub settings_path: Option<PathBuf>,
    /// `--addr` override
    pub addr: Option<String>,
}

impl LaunchOptions {
    /// Settings file to load for `role`: argument, then env var, then default
    pub fn settings_path(&self, role: Role) -> PathBuf {
        resolve_settings_path(role, self.settings_path.clone())
    }
}

/// Parse arguments (without the program name)
///
/// # Examples
/// ```
/// use console_realtime::bin_common::parse_launch_args;
///
/// let options = parse_launch_args(["demo.yaml", "--addr", "10.0.0.5:8080"]).unwrap();
/// assert_eq!(options.settings_path.unwrap().to_str(), Some("demo.yaml"));
/// assert_eq!(options.addr.as_deref(), Some("10.0.0.5:8080"));
/// ```
pub fn parse_launch_args<I, S>(args: I) -> Result<LaunchOptions, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut options = LaunchOptions::default();
    let mut args = args.into_iter().map(Into::into);

    while let Some(arg) = args.next() {
        if let Some(addr) = arg.strip_prefix("--addr=") {
            options.addr = Some(addr.to_string());
            continue;
        }
        match arg.as_str() {
            "--addr" => {
                let addr = args.next().ok_or_else(|| CliError::MissingValue(arg.clone()))?;
                options.addr = Some(addr);
            }
            "--config" | "-c" => {
                let path = args.next().ok_or_else(|| CliError::MissingValue(arg.clone()))?;
                options.settings_path = Some(PathBuf::from(path));
            }
            flag if flag.starts_with('-') => return Err(CliError::Unexpected(arg)),
            _ if options.settings_path.is_none() => {
                options.settings_path = Some(PathBuf::from(arg));
            }
            _ => return Err(CliError::Unexpected(arg)),
        }
    }

    Ok(options)
}

/// Arguments of the running process
pub fn launch_options() -> Result<LaunchOptions, CliError> {
    parse_launch_args(std::env::args().skip(1))
}

/// Settings path for `role`, preferring an explicit path over the environment
pub fn resolve_settings_path(role: Role, explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(role.settings_env_var()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(role.default_settings_path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_paths() {
        assert_eq!(Role::Client.default_settings_path(), "config/client.yaml");
        assert_eq!(Role::Hub.default_settings_path(), "config/hub.yaml");
        assert_eq!(Role::Client.settings_env_var(), "CLIENT_CONFIG_PATH");
        assert_eq!(Role::Hub.settings_env_var(), "HUB_CONFIG_PATH");
    }

    #[test]
    fn test_parse_flags() {
        let options = parse_launch_args(["--config", "a.yaml", "--addr=0.0.0.0:9000"]).unwrap();
        assert_eq!(options.settings_path, Some(PathBuf::from("a.yaml")));
        assert_eq!(options.addr.as_deref(), Some("0.0.0.0:9000"));

        let empty = parse_launch_args(Vec::<String>::new()).unwrap();
        assert_eq!(empty, LaunchOptions::default());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_launch_args(["--addr"]),
            Err(CliError::MissingValue("--addr".to_string()))
        );
        assert_eq!(
            parse_launch_args(["--verbose"]),
            Err(CliError::Unexpected("--verbose".to_string()))
        );
        assert_eq!(
            parse_launch_args(["a.yaml", "b.yaml"]),
            Err(CliError::Unexpected("b.yaml".to_string()))
        );
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = resolve_settings_path(Role::Hub, Some(PathBuf::from("mine.yaml")));
        assert_eq!(path, PathBuf::from("mine.yaml"));
    }
}
