//! Integration test: the tick/ack demo end to end through a local hub

use console_realtime::config::ClientSettings;
use console_realtime::demo::{DemoClient, Direction, CLIENT_ACK};
use console_realtime::relayhub::{HubOptions, HubServer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_demo_acknowledges_server_ticks() {
    let running = Arc::new(AtomicBool::new(true));
    let options = HubOptions {
        demo_interval: Duration::from_millis(100),
        ..HubOptions::default()
    };
    let server = HubServer::bind("127.0.0.1:0", options, Arc::clone(&running))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let incoming = server.hub().incoming();
    let server_task = tokio::spawn(server.run());

    let settings = ClientSettings::from_yaml_str(&format!(
        "host: \"{}\"\nclient_id: \"websocket-demo\"\nreconnect:\n  initial_delay_ms: 50\n  max_delay_ms: 200\n",
        addr
    ))
    .unwrap();
    let demo = DemoClient::attach(settings.build_socket().unwrap());
    demo.start();

    let mut acks = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while acks.len() < 2 && tokio::time::Instant::now() < deadline {
        acks.extend(incoming.try_iter().filter(|m| m.kind == CLIENT_ACK));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(acks.len() >= 2);
    assert_eq!(acks[0].sender, "websocket-demo");
    assert_eq!(acks[0].payload["message"], "Ack: server tick #1");
    assert_eq!(acks[1].payload["message"], "Ack: server tick #2");

    assert!(demo.is_active());
    let transcript = demo.events();
    assert!(transcript.iter().any(|e| e.direction == Direction::Out));

    demo.stop().await;
    running.store(false, Ordering::Release);
    server_task.await.unwrap().unwrap();
}
