//! Tokio driver for a [`ChannelManager`].
//!
//! [`spawn`] moves the manager onto a task that owns it exclusively. All
//! interaction afterwards goes through a cloneable [`ChannelHandle`]:
//! commands travel over an mpsc queue, status is published on a `watch`
//! channel (latest value) and a `broadcast` channel (every transition), and
//! received messages are broadcast to every subscriber.

use std::time::Duration;

use signo_frame::ChannelMessage;
use signo_transport::Connector;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{ChannelError, Result};
use crate::manager::ChannelManager;
use crate::scheduler::Scheduler;
use crate::state::ConnectionState;

const BROADCAST_CAPACITY: usize = 256;

enum Command {
    Start,
    Connect,
    Close,
    Send {
        message: ChannelMessage,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

/// Cloneable handle to a spawned channel.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionState>,
    status_events: broadcast::Sender<ConnectionState>,
    messages: broadcast::Sender<ChannelMessage>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Start => f.write_str("Start"),
            Command::Connect => f.write_str("Connect"),
            Command::Close => f.write_str("Close"),
            Command::Send { message, .. } => write!(f, "Send({})", message.kind()),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Move `manager` onto a tokio task and return a handle to it.
///
/// The task runs until [`ChannelHandle::shutdown`] is called or every handle
/// is dropped; either way the manager is torn down on exit.
pub fn spawn<C, S>(mut manager: ChannelManager<C, S>) -> (ChannelHandle, JoinHandle<()>)
where
    C: Connector + 'static,
    S: Scheduler + 'static,
{
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(manager.status());
    let (status_events, _) = broadcast::channel(BROADCAST_CAPACITY);
    let (messages, _) = broadcast::channel(BROADCAST_CAPACITY);

    let events = status_events.clone();
    manager.on_status(move |state| {
        status_tx.send_replace(state);
        let _ = events.send(state);
    });
    let fanout = messages.clone();
    manager.subscribe(move |message| {
        let _ = fanout.send(message.clone());
    });

    let task = tokio::spawn(drive(manager, commands_rx));
    let handle = ChannelHandle {
        commands: commands_tx,
        status: status_rx,
        status_events,
        messages,
    };
    (handle, task)
}

async fn drive<C, S>(
    mut manager: ChannelManager<C, S>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) where
    C: Connector,
    S: Scheduler,
{
    tracing::debug!(endpoint = %manager.endpoint(), "channel driver started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Start) => manager.start(),
                Some(Command::Connect) => manager.connect(),
                Some(Command::Close) => manager.close(),
                Some(Command::Send { message, reply }) => {
                    let result = manager.try_send(&message);
                    if let Err(err) = &result {
                        tracing::warn!(kind = message.kind(), error = %err, "message dropped");
                    }
                    let _ = reply.send(result);
                }
                Some(Command::Shutdown) | None => break,
            },
            event = manager.next_event() => match event {
                Some(event) => manager.handle_event(event),
                None => break,
            },
        }
    }
    manager.teardown();
    tracing::debug!(endpoint = %manager.endpoint(), "channel driver stopped");
}

impl ChannelHandle {
    /// Start the channel, honoring any initial connection delay.
    pub fn start(&self) -> Result<()> {
        self.command(Command::Start)
    }

    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    pub fn close(&self) -> Result<()> {
        self.command(Command::Close)
    }

    /// Tear the channel down and stop the driver task.
    pub fn shutdown(&self) -> Result<()> {
        self.command(Command::Shutdown)
    }

    /// Send a message; fails with `NotConnected` unless the channel is open.
    pub async fn send_message(&self, message: ChannelMessage) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.command(Command::Send { message, reply })?;
        response.await.map_err(|_| ChannelError::Shutdown)?
    }

    /// Send a timestamped `ping`.
    pub async fn send_control(&self) -> Result<()> {
        self.send_message(ChannelMessage::ping()).await
    }

    /// Latest published state.
    pub fn status(&self) -> ConnectionState {
        *self.status.borrow()
    }

    /// Receiver that always holds the latest state.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionState> {
        self.status.clone()
    }

    /// Receiver of every state transition from now on.
    pub fn status_events(&self) -> broadcast::Receiver<ConnectionState> {
        self.status_events.subscribe()
    }

    /// Receiver of every message received from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.messages.subscribe()
    }

    /// Wait until the state satisfies `predicate`, for at most `timeout`.
    ///
    /// Returns the matching state, or `None` on timeout or driver exit.
    pub async fn wait_for_status<F>(
        &self,
        predicate: F,
        timeout: Duration,
    ) -> Option<ConnectionState>
    where
        F: FnMut(&ConnectionState) -> bool,
    {
        let mut status = self.status.clone();
        let state = match tokio::time::timeout(timeout, status.wait_for(predicate)).await {
            Ok(Ok(state)) => Some(*state),
            _ => None,
        };
        state
    }

    /// True once the driver task has exited.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ChannelError::Shutdown)
    }
}
