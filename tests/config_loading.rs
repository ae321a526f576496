//! Integration test: Configuration utilities
//!
//! Tests settings path resolution and loading settings files from disk.

use console_realtime::bin_common::{parse_launch_args, resolve_settings_path, Role};
use console_realtime::config::{ClientSettings, ConfigError, HubSettings};
use std::env;
use std::io::Write;
use std::path::PathBuf;

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_client_config_default() {
    // Clear env var to test default
    env::remove_var("CLIENT_CONFIG_PATH");

    let config_path = resolve_settings_path(Role::Client, None);
    assert_eq!(config_path.to_str().unwrap(), "config/client.yaml");
}

#[test]
fn test_hub_config_from_env() {
    env::set_var("HUB_CONFIG_PATH", "elsewhere/hub.yaml");

    let from_env = resolve_settings_path(Role::Hub, None);
    let explicit = resolve_settings_path(Role::Hub, Some(PathBuf::from("cli/hub.yaml")));

    env::remove_var("HUB_CONFIG_PATH");
    assert_eq!(from_env.to_str().unwrap(), "elsewhere/hub.yaml");
    assert_eq!(explicit.to_str().unwrap(), "cli/hub.yaml");
}

#[test]
fn test_command_line_settings_path() {
    let launch = parse_launch_args(["custom/path.yaml"]).unwrap();
    let config_path = launch.settings_path(Role::Client);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_shipped_config_files_are_valid() {
    let manifest = env!("CARGO_MANIFEST_DIR");

    let client = ClientSettings::from_yaml_str(
        &std::fs::read_to_string(format!("{}/config/client.yaml", manifest)).unwrap(),
    )
    .unwrap();
    assert_eq!(client.path, "/api/ws");

    let hub = HubSettings::from_yaml_str(
        &std::fs::read_to_string(format!("{}/config/hub.yaml", manifest)).unwrap(),
    )
    .unwrap();
    assert_eq!(hub.max_frame_bytes, 5120);
}

#[test]
fn test_client_settings_load_with_host_override() {
    let file = write_yaml("host: \"localhost:9000\"\nclient_id: \"fixed\"\n");

    env::set_var("LIVESOCKET_HOST", "override.example.com");
    let config = ClientSettings::load(file.path()).unwrap();
    env::remove_var("LIVESOCKET_HOST");

    assert_eq!(config.host, "override.example.com");
    assert_eq!(config.client_id.as_deref(), Some("fixed"));
}

#[test]
fn test_hub_settings_load() {
    let file = write_yaml("addr: \"0.0.0.0:9100\"\nclient_buffer: 4\n");

    let config = HubSettings::load(file.path()).unwrap();
    assert_eq!(config.client_buffer, 4);
    assert_eq!(config.incoming_buffer, 32);
}

#[test]
fn test_missing_file_is_file_error() {
    let result = HubSettings::load("does/not/exist.yaml");
    assert!(matches!(result, Err(ConfigError::FileError(_))));
}

#[test]
fn test_invalid_yaml_is_yaml_error() {
    let file = write_yaml("host: [unterminated\n");
    let result = ClientSettings::load(file.path());
    assert!(matches!(result, Err(ConfigError::YamlError(_))));
}
