//! WebSocket transport on tokio-tungstenite.
//!
//! Each opened transport is driven by its own tokio task. The channel side only
//! holds a command sender; all outcomes come back through the [`EventSink`].

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::{
    Connector, EventSink, Transport, ABNORMAL_CLOSURE, NORMAL_CLOSURE, NO_STATUS,
};

/// Configuration for WebSocket transports.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Upper bound on the opening handshake.
    pub connect_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Opens WebSocket transports on the ambient tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    config: WsConfig,
}

#[derive(Debug)]
enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// Channel side of a WebSocket connection.
#[derive(Debug)]
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    close_sent: bool,
}

impl WsConnector {
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn open(&mut self, endpoint: &Endpoint, events: EventSink) -> Result<WsTransport> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let url = endpoint.as_str().to_string();
        let connect_timeout = self.config.connect_timeout;

        tracing::debug!(endpoint = %url, connection = events.connection(), "opening websocket");
        runtime.spawn(run_connection(url, connect_timeout, events, rx));

        Ok(WsTransport {
            outbound: tx,
            close_sent: false,
        })
    }
}

impl Transport for WsTransport {
    fn send_text(&mut self, text: String) -> Result<()> {
        if self.close_sent {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        if self.close_sent {
            return Ok(());
        }
        self.close_sent = true;
        self.outbound
            .send(Outbound::Close {
                code,
                reason: reason.to_string(),
            })
            .map_err(|_| TransportError::Closed)
    }
}

async fn run_connection(
    url: String,
    connect_timeout: Duration,
    events: EventSink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let connect = tokio_tungstenite::connect_async(url.as_str());
    let stream = match tokio::time::timeout(connect_timeout, connect).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(err)) => {
            tracing::debug!(endpoint = %url, error = %err, "websocket connect failed");
            events.error(err.to_string());
            events.closed(ABNORMAL_CLOSURE, err.to_string());
            return;
        }
        Err(_) => {
            let reason = format!("connect timed out after {connect_timeout:?}");
            events.error(reason.clone());
            events.closed(ABNORMAL_CLOSURE, reason);
            return;
        }
    };

    events.opened();
    let (mut write, mut read) = stream.split();
    let mut outbound_open = true;

    loop {
        tokio::select! {
            command = outbound.recv(), if outbound_open => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(err) = write.send(Message::Text(text.into())).await {
                        events.error(err.to_string());
                        events.closed(ABNORMAL_CLOSURE, err.to_string());
                        return;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    if let Err(err) = write.send(Message::Close(Some(frame))).await {
                        tracing::debug!(error = %err, "close frame not delivered");
                        events.closed(ABNORMAL_CLOSURE, err.to_string());
                        return;
                    }
                    // Keep reading until the peer echoes the close.
                }
                None => {
                    // Channel side dropped the transport without closing it.
                    outbound_open = false;
                    let _ = write
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::from(NORMAL_CLOSURE),
                            reason: String::new().into(),
                        })))
                        .await;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => events.message(text.as_str()),
                Some(Ok(Message::Binary(data))) => {
                    events.message(String::from_utf8_lossy(&data).into_owned());
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = write.flush().await;
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_string()),
                        None => (NO_STATUS, String::new()),
                    };
                    events.closed(code, reason);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    events.error(err.to_string());
                    events.closed(ABNORMAL_CLOSURE, err.to_string());
                    return;
                }
                None => {
                    events.closed(ABNORMAL_CLOSURE, "stream ended without close frame");
                    return;
                }
            },
        }
    }
}
