use anyhow::{Context, Result};
use console_realtime::bin_common::{launch_options, print_banner, print_shutdown, Role};
use console_realtime::config::HubSettings;
use console_realtime::demo::describe_payload;
use console_realtime::logging::init_tracing;
use console_realtime::relayhub::{HubServer, DEMO_START};
use console_realtime::shutdown::ShutdownManager;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let launch = launch_options()?;
    let config_path = launch.settings_path(Role::Hub);
    let mut config = HubSettings::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(addr) = launch.addr {
        config.addr = addr;
        config.validate()?;
    }

    init_tracing(&config.log_level);
    config.log();

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let server = HubServer::bind(&config.addr, config.options(), shutdown.flag())
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    let incoming = server.hub().incoming();

    print_banner(Role::Hub.display_name());
    shutdown.track_server(tokio::spawn(server.run()));

    let mut observed: u64 = 0;
    while shutdown.is_running() {
        for message in incoming.try_iter() {
            observed += 1;
            info!(
                "websocket message type={} sender={} receiver={} payload={}",
                message.kind,
                message.sender,
                message.receiver,
                describe_payload(&message.payload)
            );
            if message.kind == DEMO_START {
                info!("websocket demo start requested by {}", message.sender);
            }
        }
        shutdown.interruptible_sleep(Duration::from_millis(100)).await;
    }

    let report = shutdown.drain().await;
    if let Some(failure) = report.server_failures.first() {
        anyhow::bail!("relay hub stopped with an error: {}", failure);
    }

    print_shutdown(
        Role::Hub.display_name(),
        Some(&format!("Observed {} client message(s)", observed)),
    );

    Ok(())
}
