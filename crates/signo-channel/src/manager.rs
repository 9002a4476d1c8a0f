use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use signo_frame::{decode_or_error, encode_message, is_recognized_kind, ChannelMessage};
use signo_transport::{
    is_normal_closure, ConnectionId, Connector, Endpoint, EventSink, Transport, TransportEvent,
    NORMAL_CLOSURE,
};
use tokio::sync::mpsc;

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::guard::ConnectGuard;
use crate::policy::ReconnectPolicy;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::state::ConnectionState;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

const CLOSE_REASON: &str = "client closing";
const TEARDOWN_REASON: &str = "client teardown";

/// Identifies a registered message subscriber or status listener.
pub type SubscriptionId = u64;

type MessageHandler = Box<dyn FnMut(&ChannelMessage) + Send>;
type StatusHandler = Box<dyn FnMut(ConnectionState) + Send>;

/// Input to the manager's state machine.
///
/// Transports and timers never touch the manager directly; they post one of
/// these into its queue and the manager processes them one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// Lifecycle event from the transport with the given connection id.
    Transport {
        connection: ConnectionId,
        event: TransportEvent,
    },
    /// A scheduled timer fired.
    Timer { token: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    InitialConnect,
    Reconnect,
    GuardRetry,
    CloseTimeout,
}

#[derive(Debug)]
struct PendingTimer {
    token: u64,
    handle: TimerHandle,
    kind: TimerKind,
}

struct Live<T> {
    id: ConnectionId,
    transport: T,
}

/// Owns one logical realtime channel and its reconnection policy.
///
/// The manager is a single-threaded state machine. Public operations act
/// immediately on local state and never block; transport and timer outcomes
/// are queued and applied by [`process_pending`](Self::process_pending) or by
/// an async driver calling [`next_event`](Self::next_event) and
/// [`handle_event`](Self::handle_event).
pub struct ChannelManager<C: Connector, S: Scheduler> {
    id: u64,
    endpoint: Endpoint,
    config: ChannelConfig,
    connector: C,
    scheduler: S,
    state: ConnectionState,
    policy: ReconnectPolicy,
    live: Option<Live<C::Transport>>,
    next_connection: ConnectionId,
    timer: Option<PendingTimer>,
    next_token: u64,
    close_requested: bool,
    cancelled: bool,
    guard: Option<ConnectGuard>,
    guard_deferrals: u32,
    subscribers: Vec<(SubscriptionId, MessageHandler)>,
    status_listeners: Vec<(SubscriptionId, StatusHandler)>,
    next_subscription: SubscriptionId,
    last_error: Option<ChannelError>,
    events_tx: mpsc::UnboundedSender<ManagerEvent>,
    events_rx: mpsc::UnboundedReceiver<ManagerEvent>,
}

impl<C: Connector, S: Scheduler> ChannelManager<C, S> {
    /// Create a manager in the `Idle` state. Nothing connects until
    /// [`start`](Self::start) or [`connect`](Self::connect).
    pub fn new(endpoint: Endpoint, config: ChannelConfig, connector: C, scheduler: S) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            policy: ReconnectPolicy::from_config(&config),
            endpoint,
            config,
            connector,
            scheduler,
            state: ConnectionState::Idle,
            live: None,
            next_connection: 0,
            timer: None,
            next_token: 0,
            close_requested: false,
            cancelled: false,
            guard: None,
            guard_deferrals: 0,
            subscribers: Vec::new(),
            status_listeners: Vec::new(),
            next_subscription: 1,
            last_error: None,
            events_tx,
            events_rx,
        }
    }

    /// Coordinate connection attempts with other managers sharing `guard`.
    pub fn with_guard(mut self, guard: ConnectGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Begin connecting, after `initialConnectionDelayMs` if configured.
    pub fn start(&mut self) {
        if self.cancelled || self.state != ConnectionState::Idle {
            return;
        }
        match self.config.initial_connection_delay() {
            Some(delay) => {
                tracing::debug!(endpoint = %self.endpoint, ?delay, "deferring initial connect");
                self.schedule(TimerKind::InitialConnect, delay);
            }
            None => self.connect(),
        }
    }

    /// Open a transport unless one is already connecting or open.
    ///
    /// From a terminal `Closed` state this is the manual reconnect: the
    /// explicit-close flag clears and the retry budget starts over.
    pub fn connect(&mut self) {
        if self.cancelled {
            tracing::debug!(endpoint = %self.endpoint, "connect after teardown ignored");
            return;
        }
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing => {
                tracing::debug!(endpoint = %self.endpoint, state = %self.state, "connect ignored");
                return;
            }
            ConnectionState::Closed => self.policy.reset(),
            ConnectionState::Idle | ConnectionState::Faulted => {}
        }
        self.cancel_timer();
        self.close_requested = false;
        self.guard_deferrals = 0;
        self.open_transport();
    }

    /// Close the channel gracefully and stop reconnecting.
    ///
    /// With a live transport the channel stays `Closing` until the peer
    /// answers the close frame or `closeTimeoutMs` elapses, whichever is first.
    pub fn close(&mut self) {
        if self.cancelled {
            return;
        }
        self.close_requested = true;
        self.cancel_timer();

        if matches!(
            self.state,
            ConnectionState::Closing | ConnectionState::Closed
        ) {
            return;
        }

        if self.live.is_none() {
            self.release_guard();
            self.transition(ConnectionState::Closed);
            return;
        }

        self.transition(ConnectionState::Closing);
        let result = self
            .live
            .as_mut()
            .map(|live| live.transport.close(NORMAL_CLOSURE, CLOSE_REASON));
        self.release_guard();
        if let Some(Err(err)) = result {
            tracing::debug!(endpoint = %self.endpoint, error = %err, "transport already gone");
            self.live = None;
            self.transition(ConnectionState::Closed);
        } else if let Some(timeout) = self.config.close_timeout() {
            self.schedule(TimerKind::CloseTimeout, timeout);
        }
    }

    /// Tear the manager down for good.
    ///
    /// Cancels timers, closes the transport with a normal closure, publishes
    /// `Closed` once and turns every later event or call into a no-op.
    pub fn teardown(&mut self) {
        if self.cancelled {
            return;
        }
        self.close_requested = true;
        self.cancel_timer();
        if let Some(mut live) = self.live.take() {
            if let Err(err) = live.transport.close(NORMAL_CLOSURE, TEARDOWN_REASON) {
                tracing::debug!(endpoint = %self.endpoint, error = %err, "transport already gone");
            }
        }
        self.release_guard();
        if self.state != ConnectionState::Closed {
            self.transition(ConnectionState::Closed);
        }
        self.cancelled = true;
        self.subscribers.clear();
        self.status_listeners.clear();
        tracing::debug!(endpoint = %self.endpoint, "channel manager torn down");
    }

    /// Send a message, or drop it if the channel is not open.
    ///
    /// Returns whether the frame was handed to the transport. Nothing is
    /// buffered: a message sent while disconnected is gone.
    pub fn send_message(&mut self, message: &ChannelMessage) -> bool {
        match self.try_send(message) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    kind = message.kind(),
                    error = %err,
                    "message dropped"
                );
                false
            }
        }
    }

    /// Like [`send_message`](Self::send_message) but reports why a message
    /// was dropped.
    pub fn try_send(&mut self, message: &ChannelMessage) -> Result<()> {
        if self.cancelled {
            return Err(ChannelError::Shutdown);
        }
        if self.state != ConnectionState::Open {
            return Err(ChannelError::NotConnected(self.state));
        }
        let text = encode_message(message).map_err(ChannelError::Encode)?;
        let live = self
            .live
            .as_mut()
            .ok_or(ChannelError::NotConnected(self.state))?;
        live.transport.send_text(text).map_err(ChannelError::Send)
    }

    /// Send a timestamped `ping`. A `pong` arrives like any other message.
    pub fn send_control(&mut self) -> bool {
        self.send_message(&ChannelMessage::ping())
    }

    /// Register a handler called once per received message, in receipt order.
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&ChannelMessage) + Send + 'static,
    {
        let id = self.next_subscription_id();
        self.subscribers.push((id, Box::new(handler)));
        id
    }

    /// Register a handler called on every state transition, in order.
    pub fn on_status<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(ConnectionState) + Send + 'static,
    {
        let id = self.next_subscription_id();
        self.status_listeners.push((id, Box::new(handler)));
        id
    }

    /// Remove a subscriber or status listener.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len() + self.status_listeners.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.status_listeners.retain(|(sub, _)| *sub != id);
        before != self.subscribers.len() + self.status_listeners.len()
    }

    /// Apply every queued transport and timer event. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            processed += 1;
        }
        processed
    }

    /// Wait for the next queued event.
    ///
    /// The manager keeps a sender alive, so this only returns `None` if the
    /// queue has been closed from the outside.
    pub async fn next_event(&mut self) -> Option<ManagerEvent> {
        self.events_rx.recv().await
    }

    /// Apply one event to the state machine.
    pub fn handle_event(&mut self, event: ManagerEvent) {
        if self.cancelled {
            tracing::trace!(?event, "event after teardown ignored");
            return;
        }
        match event {
            ManagerEvent::Timer { token } => self.on_timer(token),
            ManagerEvent::Transport { connection, event } => {
                if self.live.as_ref().map(|live| live.id) != Some(connection) {
                    tracing::trace!(connection, ?event, "stale transport event ignored");
                    return;
                }
                match event {
                    TransportEvent::Opened => self.on_open(),
                    TransportEvent::Message(text) => self.on_message(&text),
                    TransportEvent::Error(description) => self.on_error(description),
                    TransportEvent::Closed { code, reason } => self.on_closed(code, reason),
                }
            }
        }
    }

    pub fn status(&self) -> ConnectionState {
        self.state
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Reconnect attempts scheduled since the channel last opened.
    pub fn reconnect_attempts(&self) -> u32 {
        self.policy.attempts()
    }

    /// True while any timer (initial connect, reconnect, guard retry, close timeout) is pending.
    pub fn has_pending_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// True while a reconnect is scheduled.
    pub fn has_pending_reconnect(&self) -> bool {
        matches!(&self.timer, Some(timer) if timer.kind == TimerKind::Reconnect)
    }

    /// Most recent failure or closure reason.
    pub fn last_error(&self) -> Option<&ChannelError> {
        self.last_error.as_ref()
    }

    fn open_transport(&mut self) {
        if let Some(guard) = self.guard.clone() {
            if !guard.try_acquire(self.id) {
                if self.guard_deferrals < self.config.max_guard_deferrals {
                    self.guard_deferrals += 1;
                    tracing::debug!(
                        endpoint = %self.endpoint,
                        holder = ?guard.holder(),
                        deferral = self.guard_deferrals,
                        "connect guard busy, deferring"
                    );
                    self.schedule(TimerKind::GuardRetry, self.config.guard_retry_delay());
                    return;
                }
                tracing::warn!(
                    endpoint = %self.endpoint,
                    deferrals = self.guard_deferrals,
                    "connect guard still busy, connecting anyway"
                );
            }
        }
        self.guard_deferrals = 0;

        self.next_connection += 1;
        let connection = self.next_connection;
        self.transition(ConnectionState::Connecting);

        let sink = self.event_sink(connection);
        match self.connector.open(&self.endpoint, sink) {
            Ok(transport) => {
                tracing::debug!(endpoint = %self.endpoint, connection, "transport created");
                self.live = Some(Live {
                    id: connection,
                    transport,
                });
            }
            Err(err) => self.fault(ChannelError::TransportConstruction(err)),
        }
    }

    fn on_timer(&mut self, token: u64) {
        let Some(timer) = self.timer.take_if(|timer| timer.token == token) else {
            tracing::trace!(token, "stale timer ignored");
            return;
        };
        match timer.kind {
            TimerKind::Reconnect => {
                if self.state == ConnectionState::Faulted {
                    tracing::info!(
                        endpoint = %self.endpoint,
                        attempt = self.policy.attempts(),
                        max = self.policy.max_attempts(),
                        "reconnecting"
                    );
                    self.open_transport();
                }
            }
            TimerKind::InitialConnect | TimerKind::GuardRetry => {
                if !self.state.is_active() && self.state != ConnectionState::Closing {
                    self.open_transport();
                }
            }
            TimerKind::CloseTimeout => {
                if self.state == ConnectionState::Closing {
                    tracing::warn!(endpoint = %self.endpoint, "peer never answered close; dropping transport");
                    self.live = None;
                    self.transition(ConnectionState::Closed);
                }
            }
        }
    }

    fn on_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            tracing::debug!(state = %self.state, "open reported outside connecting");
            return;
        }
        self.policy.reset();
        self.release_guard();
        self.transition(ConnectionState::Open);
        tracing::info!(endpoint = %self.endpoint, "channel open");
    }

    fn on_message(&mut self, text: &str) {
        let (message, failure) = decode_or_error(text, self.config.max_frame_len);
        if let Some(err) = failure {
            self.last_error = Some(ChannelError::Decode(err));
        }
        tracing::trace!(
            kind = message.kind(),
            recognized = is_recognized_kind(message.kind()),
            size = text.len(),
            "message received"
        );
        for (_, handler) in self.subscribers.iter_mut() {
            handler(&message);
        }
    }

    fn on_error(&mut self, description: String) {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                self.fault(ChannelError::TransportRuntime(description));
            }
            _ => {
                tracing::debug!(state = %self.state, error = %description, "transport error while not active");
            }
        }
    }

    fn on_closed(&mut self, code: u16, reason: String) {
        match self.state {
            ConnectionState::Closing => {
                self.cancel_timer();
                self.live = None;
                self.transition(ConnectionState::Closed);
                tracing::info!(endpoint = %self.endpoint, code, "channel closed");
            }
            ConnectionState::Connecting | ConnectionState::Open if is_normal_closure(code) => {
                self.live = None;
                self.release_guard();
                tracing::info!(endpoint = %self.endpoint, %reason, "channel closed by peer");
                self.last_error = Some(ChannelError::NormalClosure { reason });
                self.transition(ConnectionState::Closed);
            }
            ConnectionState::Connecting | ConnectionState::Open => {
                self.fault(ChannelError::AbnormalClosure { code, reason });
            }
            _ => {}
        }
    }

    fn fault(&mut self, err: ChannelError) {
        debug_assert!(err.is_connectivity_loss(), "fault without connectivity loss: {err}");
        tracing::warn!(endpoint = %self.endpoint, error = %err, "channel faulted");
        self.live = None;
        self.release_guard();
        self.last_error = Some(err);
        self.transition(ConnectionState::Faulted);

        if self.close_requested || !self.config.auto_reconnect {
            self.transition(ConnectionState::Closed);
            return;
        }

        match self.policy.next_delay() {
            Some(delay) => {
                tracing::info!(
                    endpoint = %self.endpoint,
                    attempt = self.policy.attempts(),
                    max = self.policy.max_attempts(),
                    delay_ms = delay_ms(delay),
                    "scheduling reconnect"
                );
                self.schedule(TimerKind::Reconnect, delay);
            }
            None => {
                let err = ChannelError::RetryBudgetExhausted(self.policy.attempts());
                tracing::warn!(endpoint = %self.endpoint, error = %err, "giving up");
                self.last_error = Some(err);
                self.transition(ConnectionState::Closed);
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        let previous = std::mem::replace(&mut self.state, next);
        tracing::debug!(
            endpoint = %self.endpoint,
            from = %previous,
            to = %next,
            "channel state transition"
        );
        for (_, listener) in self.status_listeners.iter_mut() {
            listener(next);
        }
    }

    fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        self.cancel_timer();
        self.next_token += 1;
        let token = self.next_token;
        let tx = self.events_tx.clone();
        let handle = self.scheduler.schedule_after(
            delay,
            Box::new(move || {
                let _ = tx.send(ManagerEvent::Timer { token });
            }),
        );
        self.timer = Some(PendingTimer {
            token,
            handle,
            kind,
        });
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.scheduler.cancel(timer.handle);
        }
    }

    fn release_guard(&mut self) {
        if let Some(guard) = &self.guard {
            guard.release(self.id);
        }
    }

    fn event_sink(&self, connection: ConnectionId) -> EventSink {
        let tx = self.events_tx.clone();
        EventSink::new(connection, move |connection, event| {
            let _ = tx.send(ManagerEvent::Transport { connection, event });
        })
    }

    fn next_subscription_id(&mut self) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        id
    }
}

impl<C: Connector, S: Scheduler> Drop for ChannelManager<C, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<C: Connector, S: Scheduler> fmt::Debug for ChannelManager<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelManager")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.as_str())
            .field("state", &self.state)
            .field("attempts", &self.policy.attempts())
            .field("connection", &self.live.as_ref().map(|live| live.id))
            .field("pending_timer", &self.timer)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

fn delay_ms(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use signo_transport::MemoryConnector;

    use super::*;
    use crate::scheduler::ManualScheduler;

    type TestManager = ChannelManager<MemoryConnector, ManualScheduler>;

    fn manager(config: ChannelConfig) -> (TestManager, MemoryConnector, ManualScheduler) {
        let connector = MemoryConnector::new();
        let scheduler = ManualScheduler::new();
        let endpoint = Endpoint::parse("ws://localhost:5000/ws").unwrap();
        let manager =
            ChannelManager::new(endpoint, config, connector.clone(), scheduler.clone());
        (manager, connector, scheduler)
    }

    fn record_states(manager: &mut TestManager) -> Arc<Mutex<Vec<ConnectionState>>> {
        let states = Arc::new(Mutex::new(Vec::new()));
        let captured = states.clone();
        manager.on_status(move |state| captured.lock().unwrap().push(state));
        states
    }

    #[test]
    fn connect_then_open() {
        let (mut manager, connector, _) = manager(ChannelConfig::default());
        let states = record_states(&mut manager);

        manager.connect();
        connector.accept();
        manager.process_pending();

        assert_eq!(manager.status(), ConnectionState::Open);
        assert_eq!(
            *states.lock().unwrap(),
            vec![ConnectionState::Connecting, ConnectionState::Open]
        );
        assert_eq!(
            connector.last_endpoint().as_deref(),
            Some("ws://localhost:5000/ws")
        );
    }

    #[test]
    fn send_writes_encoded_frame_when_open() {
        let (mut manager, connector, _) = manager(ChannelConfig::default());
        manager.connect();
        connector.accept();
        manager.process_pending();

        assert!(manager.send_message(&ChannelMessage::new("chat").with_field("message", "hi")));
        assert!(manager.send_control());

        let frames = connector.sent_frames();
        assert_eq!(frames[0], r#"{"kind":"chat","message":"hi"}"#);
        assert!(frames[1].starts_with(r#"{"kind":"ping","timestamp":""#));
    }

    #[test]
    fn try_send_reports_not_connected() {
        let (mut manager, _, _) = manager(ChannelConfig::default());
        assert!(matches!(
            manager.try_send(&ChannelMessage::ping()),
            Err(ChannelError::NotConnected(ConnectionState::Idle))
        ));
    }

    #[test]
    fn normal_closure_from_peer_is_terminal() {
        let (mut manager, connector, scheduler) = manager(ChannelConfig::default());
        manager.connect();
        connector.accept();
        manager.process_pending();

        connector.drop_connection(NORMAL_CLOSURE, "maintenance");
        manager.process_pending();

        assert_eq!(manager.status(), ConnectionState::Closed);
        assert_eq!(scheduler.pending(), 0);
        assert!(matches!(
            manager.last_error(),
            Some(ChannelError::NormalClosure { .. })
        ));
    }

    #[test]
    fn construction_failure_goes_through_backoff() {
        let (mut manager, connector, scheduler) = manager(ChannelConfig::default());
        connector.refuse_next(1);

        manager.connect();
        assert_eq!(manager.status(), ConnectionState::Faulted);
        assert!(manager.has_pending_reconnect());
        assert!(matches!(
            manager.last_error(),
            Some(ChannelError::TransportConstruction(_))
        ));

        scheduler.advance(Duration::from_millis(1_000));
        manager.process_pending();
        assert_eq!(manager.status(), ConnectionState::Connecting);
        assert_eq!(connector.opened_count(), 1);
    }

    #[test]
    fn auto_reconnect_disabled_closes_on_fault() {
        let config = ChannelConfig {
            auto_reconnect: false,
            ..ChannelConfig::default()
        };
        let (mut manager, connector, scheduler) = manager(config);
        let states = record_states(&mut manager);

        manager.connect();
        connector.fail("reset by peer");
        manager.process_pending();

        assert_eq!(
            *states.lock().unwrap(),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Faulted,
                ConnectionState::Closed
            ]
        );
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn manual_connect_after_exhaustion_gets_fresh_budget() {
        let config = ChannelConfig {
            max_reconnect_attempts: 0,
            ..ChannelConfig::default()
        };
        let (mut manager, connector, _) = manager(config);
        manager.connect();
        connector.fail("down");
        manager.process_pending();
        assert_eq!(manager.status(), ConnectionState::Closed);
        assert!(matches!(
            manager.last_error(),
            Some(ChannelError::RetryBudgetExhausted(0))
        ));

        manager.connect();
        connector.accept();
        manager.process_pending();
        assert_eq!(manager.status(), ConnectionState::Open);
        assert_eq!(connector.opened_count(), 2);
    }

    #[test]
    fn close_without_transport_is_immediate() {
        let (mut manager, _, _) = manager(ChannelConfig::default());
        let states = record_states(&mut manager);
        manager.close();
        manager.close();
        assert_eq!(*states.lock().unwrap(), vec![ConnectionState::Closed]);
    }

    #[test]
    fn unanswered_close_times_out_to_closed() {
        let (mut manager, connector, scheduler) = manager(ChannelConfig::default());
        manager.connect();
        connector.accept();
        manager.process_pending();

        manager.close();
        assert_eq!(manager.status(), ConnectionState::Closing);
        assert!(manager.has_pending_timer());

        scheduler.advance(Duration::from_millis(4_999));
        manager.process_pending();
        assert_eq!(manager.status(), ConnectionState::Closing);

        scheduler.advance(Duration::from_millis(1));
        manager.process_pending();
        assert_eq!(manager.status(), ConnectionState::Closed);
        assert!(!manager.has_pending_timer());

        // A late close frame from the dropped connection changes nothing.
        connector.finish_close();
        manager.process_pending();
        assert_eq!(manager.status(), ConnectionState::Closed);
        assert_eq!(connector.opened_count(), 1);
    }

    #[test]
    fn answered_close_cancels_the_close_timeout() {
        let (mut manager, connector, scheduler) = manager(ChannelConfig::default());
        manager.connect();
        connector.accept();
        manager.process_pending();

        manager.close();
        connector.finish_close();
        manager.process_pending();
        assert_eq!(manager.status(), ConnectionState::Closed);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn initial_connection_delay_defers_first_connect() {
        let config = ChannelConfig {
            initial_connection_delay_ms: Some(250),
            ..ChannelConfig::default()
        };
        let (mut manager, connector, scheduler) = manager(config);

        manager.start();
        assert_eq!(manager.status(), ConnectionState::Idle);
        assert_eq!(connector.opened_count(), 0);

        scheduler.advance(Duration::from_millis(250));
        manager.process_pending();
        assert_eq!(manager.status(), ConnectionState::Connecting);
        assert_eq!(connector.opened_count(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let (mut manager, connector, _) = manager(ChannelConfig::default());
        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        let id = manager.subscribe(move |_| *counter.lock().unwrap() += 1);

        manager.connect();
        connector.accept();
        connector.deliver(r#"{"kind":"welcome"}"#);
        manager.process_pending();
        assert!(manager.unsubscribe(id));
        assert!(!manager.unsubscribe(id));
        connector.deliver(r#"{"kind":"broadcast"}"#);
        manager.process_pending();

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn teardown_silences_late_events() {
        let (mut manager, connector, scheduler) = manager(ChannelConfig::default());
        let seen = Arc::new(Mutex::new(0));
        let counter = seen.clone();
        manager.subscribe(move |_| *counter.lock().unwrap() += 1);

        manager.connect();
        connector.accept();
        manager.process_pending();
        connector.fail("flaky");
        manager.process_pending();
        assert!(manager.has_pending_reconnect());

        manager.teardown();
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(manager.status(), ConnectionState::Closed);

        connector.deliver(r#"{"kind":"chat"}"#);
        scheduler.advance(Duration::from_secs(60));
        manager.process_pending();
        manager.connect();

        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(manager.status(), ConnectionState::Closed);
        assert_eq!(connector.opened_count(), 1);
        assert!(matches!(
            manager.try_send(&ChannelMessage::ping()),
            Err(ChannelError::Shutdown)
        ));
    }
}
