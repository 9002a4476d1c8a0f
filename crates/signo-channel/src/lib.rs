//! Reconnecting realtime channel management.
//!
//! This is the layer application code talks to. A [`ChannelManager`] owns one
//! logical channel to a server endpoint: it drives the connection lifecycle,
//! fans decoded messages out to subscribers, and hides transient connectivity
//! loss behind bounded, backoff-based reconnection.
//!
//! Nothing here ever fails across the public API. Failures surface through the
//! observable [`ConnectionState`] and through synthetic `error` messages.

pub mod config;
pub mod error;
pub mod guard;
pub mod log;
pub mod manager;
pub mod policy;
pub mod scheduler;
pub mod state;

#[cfg(feature = "async")]
pub mod runtime;

pub use config::ChannelConfig;
pub use error::{ChannelError, Result};
pub use guard::ConnectGuard;
pub use log::MessageLog;
pub use manager::{ChannelManager, ManagerEvent, SubscriptionId};
pub use policy::ReconnectPolicy;
pub use scheduler::{ManualScheduler, Scheduler, TimerCallback, TimerHandle};
pub use state::ConnectionState;

#[cfg(feature = "async")]
pub use runtime::{spawn, ChannelHandle};
#[cfg(feature = "async")]
pub use scheduler::TokioScheduler;
