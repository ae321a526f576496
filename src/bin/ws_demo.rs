use anyhow::{Context, Result};
use console_realtime::bin_common::{launch_options, print_banner, print_shutdown, Role};
use console_realtime::config::ClientSettings;
use console_realtime::demo::{DemoClient, Direction};
use console_realtime::livesocket::ClientEvent;
use console_realtime::logging::init_tracing;
use console_realtime::shutdown::ShutdownManager;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let launch = launch_options()?;
    let config_path = launch.settings_path(Role::Client);
    let mut config = ClientSettings::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(host) = launch.addr {
        config.host = host;
        config.validate()?;
    }

    init_tracing(&config.log_level);
    config.log();

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let socket = config.build_socket()?;
    shutdown.track_socket(&socket);
    info!("Client id: {}", socket.client_id());
    info!("Endpoint: {}", socket.url());

    let demo = DemoClient::attach(socket.clone());
    print_banner(Role::Client.display_name());
    demo.start();

    let events = socket.events();
    while shutdown.is_running() {
        for event in events.try_iter() {
            match event {
                ClientEvent::Connected => info!("Connection open"),
                ClientEvent::Disconnected { reason } => warn!("Connection lost: {}", reason),
                ClientEvent::ReconnectScheduled { attempt, delay } => {
                    info!("Reconnect #{} in {:?}", attempt, delay)
                }
                ClientEvent::FrameDropped { reason } => warn!("Dropped inbound frame: {}", reason),
                ClientEvent::MessageEvicted { kind } => warn!("Evicted queued '{}' message", kind),
                ClientEvent::Connecting { .. } | ClientEvent::ShutDown => {}
            }
        }
        shutdown.interruptible_sleep(Duration::from_millis(250)).await;
    }

    demo.detach();
    let acks = demo
        .events()
        .iter()
        .filter(|event| event.direction == Direction::Out)
        .count();
    let report = shutdown.drain().await;
    let metrics = socket.metrics();

    print_shutdown(
        Role::Client.display_name(),
        Some(&format!(
            "Received {} message(s), sent {} ack(s), {} reconnect(s), {} undelivered",
            metrics.messages_received, acks, metrics.reconnect_count, report.undelivered
        )),
    );

    Ok(())
}
