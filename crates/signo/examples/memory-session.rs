//! Walk a channel through a flaky connection using the in-memory transport
//! and a virtual clock.
//!
//! Run with: `cargo run -p signo --example memory-session`

use std::time::Duration;

use signo::channel::{ChannelConfig, ChannelManager, ManualScheduler, MessageLog};
use signo::transport::{Endpoint, MemoryConnector, ABNORMAL_CLOSURE};
use signo::ChannelMessage;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let connector = MemoryConnector::new();
    let clock = ManualScheduler::new();
    let config = ChannelConfig {
        reconnect_interval_ms: 200,
        max_reconnect_attempts: 3,
        ..ChannelConfig::default()
    };

    let mut manager = ChannelManager::new(
        Endpoint::from_origin("https://app.signo.example")?,
        config,
        connector.clone(),
        clock.clone(),
    );
    manager.on_status(|state| println!("status: {} [{}]", state, state.badge()));
    let log = MessageLog::new();
    log.attach(&mut manager);

    manager.start();
    connector.accept();
    connector.deliver(r#"{"kind":"welcome","id":"driver-17"}"#);
    manager.process_pending();

    manager.send_message(&ChannelMessage::chat("loaded at Nagpur, leaving now"));

    connector.drop_connection(ABNORMAL_CLOSURE, "tower handover");
    manager.process_pending();
    manager.send_message(&ChannelMessage::chat("this one is dropped"));

    let delay = clock.next_due().unwrap_or(Duration::ZERO);
    println!("reconnecting in {delay:?}");
    clock.advance(delay);
    manager.process_pending();
    connector.accept();
    connector.deliver("garbled");
    manager.process_pending();

    manager.close();
    connector.finish_close();
    manager.process_pending();

    println!("sent frames: {:?}", connector.sent_frames());
    println!("received kinds: {:?}", log.kinds());
    Ok(())
}
