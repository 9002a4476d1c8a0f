use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use signo_channel::{spawn, ChannelConfig, ChannelManager, ConnectionState, TokioScheduler};
use signo_frame::ChannelMessage;
use signo_transport::{Endpoint, WsConnector};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

/// Greets every connection, then wraps each text frame in a broadcast.
async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let _ = ws
                    .send(Message::text(r#"{"kind":"welcome","id":"d-7"}"#))
                    .await;
                while let Some(Ok(frame)) = ws.next().await {
                    match frame {
                        Message::Text(text) => {
                            let reply = format!(r#"{{"kind":"broadcast","echo":{}}}"#, text.as_str());
                            if ws.send(Message::text(reply)).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => {
                            let _ = ws.flush().await;
                            break;
                        }
                        _ => {}
                    }
                }
            });
        }
    });
    addr
}

fn ws_manager(
    url: &str,
    config: ChannelConfig,
) -> ChannelManager<WsConnector, TokioScheduler> {
    ChannelManager::new(
        Endpoint::parse(url).unwrap(),
        config,
        WsConnector::default(),
        TokioScheduler::new(),
    )
}

#[tokio::test]
async fn spawned_channel_talks_to_a_websocket_server() {
    let addr = start_server().await;
    let (handle, task) = spawn(ws_manager(&format!("ws://{addr}/ws"), ChannelConfig::default()));
    let mut messages = handle.subscribe();

    handle.start().unwrap();
    assert_eq!(
        handle
            .wait_for_status(|s| *s == ConnectionState::Open, WAIT)
            .await,
        Some(ConnectionState::Open)
    );

    let welcome = tokio::time::timeout(WAIT, messages.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(welcome.kind(), "welcome");
    assert_eq!(welcome.text("id"), Some("d-7"));

    handle
        .send_message(ChannelMessage::chat("unloading at bay 4"))
        .await
        .unwrap();
    let echoed = tokio::time::timeout(WAIT, messages.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed.kind(), "broadcast");
    assert_eq!(
        echoed
            .field("echo")
            .and_then(|echo| echo.get("message"))
            .and_then(|m| m.as_str()),
        Some("unloading at bay 4")
    );

    handle.close().unwrap();
    assert_eq!(
        handle
            .wait_for_status(|s| *s == ConnectionState::Closed, WAIT)
            .await,
        Some(ConnectionState::Closed)
    );

    handle.shutdown().unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn refused_connection_without_reconnect_ends_closed() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ChannelConfig {
        auto_reconnect: false,
        ..ChannelConfig::default()
    };
    let (handle, task) = spawn(ws_manager(&format!("ws://{addr}/ws"), config));
    let mut transitions = handle.status_events();

    handle.connect().unwrap();
    assert_eq!(
        handle
            .wait_for_status(
                |s| matches!(s, ConnectionState::Open | ConnectionState::Closed),
                WAIT
            )
            .await,
        Some(ConnectionState::Closed)
    );

    let mut seen = Vec::new();
    while let Ok(state) = transitions.try_recv() {
        seen.push(state);
    }
    assert_eq!(
        seen,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Faulted,
            ConnectionState::Closed
        ]
    );

    handle.shutdown().unwrap();
    task.await.unwrap();
}
