//! Connect to a channel server and print messages until Ctrl-C.
//!
//! Run with: `cargo run -p signo --features async --example ws-listen -- ws://localhost:5000/ws`

use std::time::Duration;

use signo::channel::{spawn, ChannelConfig, ChannelManager, TokioScheduler};
use signo::transport::{Endpoint, WsConnector};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:5000/ws".to_string());
    let manager = ChannelManager::new(
        Endpoint::parse(&target)?,
        ChannelConfig::default(),
        WsConnector::default(),
        TokioScheduler::new(),
    );
    let (handle, task) = spawn(manager);
    let mut messages = handle.subscribe();
    let mut states = handle.status_events();
    handle.start()?;

    loop {
        tokio::select! {
            Ok(message) = messages.recv() => println!("{}: {:?}", message.kind(), message.payload()),
            Ok(state) = states.recv() => {
                println!("-- {state}");
                if state.is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.close()?;
    handle
        .wait_for_status(|state| state.is_terminal(), Duration::from_secs(2))
        .await;
    handle.shutdown()?;
    task.await?;
    Ok(())
}
