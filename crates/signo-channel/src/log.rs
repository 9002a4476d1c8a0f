use std::sync::{Arc, Mutex, MutexGuard};

use signo_frame::ChannelMessage;
use signo_transport::Connector;

use crate::manager::{ChannelManager, SubscriptionId};
use crate::scheduler::Scheduler;

/// Append-only record of every message a channel received.
///
/// Clones share the same buffer. Typical use is one subscriber feeding the
/// log while a UI or test reads snapshots.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Arc<Mutex<Vec<ChannelMessage>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChannelMessage>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe this log to `manager`.
    pub fn attach<C: Connector, S: Scheduler>(
        &self,
        manager: &mut ChannelManager<C, S>,
    ) -> SubscriptionId {
        let log = self.clone();
        manager.subscribe(move |message| log.push(message.clone()))
    }

    pub fn push(&self, message: ChannelMessage) {
        self.lock().push(message);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Copy of every entry in receipt order.
    pub fn snapshot(&self) -> Vec<ChannelMessage> {
        self.lock().clone()
    }

    /// Kinds of every entry in receipt order.
    pub fn kinds(&self) -> Vec<String> {
        self.lock().iter().map(|m| m.kind().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
