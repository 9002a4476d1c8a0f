//! Timer scheduling.
//!
//! The manager never sleeps. It asks a [`Scheduler`] to run a callback later
//! and keeps the returned handle so the timer can be cancelled. Production code
//! uses [`TokioScheduler`]; tests use [`ManualScheduler`] and move virtual
//! time forward explicitly.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Work to run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a scheduled timer for cancellation.
pub type TimerHandle = u64;

/// Runs callbacks after a delay.
pub trait Scheduler: Send {
    /// Run `callback` once `delay` has elapsed.
    fn schedule_after(&mut self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Cancel a timer. Cancelling a fired or unknown timer does nothing.
    fn cancel(&mut self, handle: TimerHandle);
}

struct PendingTimer {
    due: Duration,
    handle: TimerHandle,
    callback: TimerCallback,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_handle: TimerHandle,
    pending: Vec<PendingTimer>,
    requested: Vec<Duration>,
}

/// Virtual-time scheduler.
///
/// Clones share one clock, so a test can keep a handle while the manager owns
/// another. Timers fire only inside [`advance`](Self::advance), in due order,
/// with ties broken by scheduling order.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of timers scheduled and not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Every delay ever requested, in request order.
    pub fn requested_delays(&self) -> Vec<Duration> {
        self.lock().requested.clone()
    }

    /// Time until the earliest pending timer fires.
    pub fn next_due(&self) -> Option<Duration> {
        let state = self.lock();
        state
            .pending
            .iter()
            .map(|timer| timer.due.saturating_sub(state.now))
            .min()
    }

    /// Move virtual time forward by `by`, firing every timer that comes due.
    ///
    /// Returns the number of timers fired. Callbacks run outside the lock and
    /// may schedule further timers; those fire too if they fall in the window.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now + by;
        let mut fired = 0;

        loop {
            let next = {
                let mut state = self.lock();
                let earliest = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.due <= target)
                    .min_by_key(|(_, timer)| (timer.due, timer.handle))
                    .map(|(index, _)| index);
                earliest.map(|index| {
                    let timer = state.pending.remove(index);
                    state.now = timer.due;
                    timer.callback
                })
            };

            match next {
                Some(callback) => {
                    callback();
                    fired += 1;
                }
                None => break,
            }
        }

        self.lock().now = target;
        fired
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&mut self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let mut state = self.lock();
        state.next_handle += 1;
        let handle = state.next_handle;
        let due = state.now + delay;
        state.requested.push(delay);
        state.pending.push(PendingTimer {
            due,
            handle,
            callback,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.lock().pending.retain(|timer| timer.handle != handle);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .finish()
    }
}

#[cfg(feature = "async")]
pub use self::tokio_impl::TokioScheduler;

#[cfg(feature = "async")]
mod tokio_impl {
    use std::collections::HashMap;
    use std::time::Duration;

    use tokio::task::AbortHandle;

    use super::{Scheduler, TimerCallback, TimerHandle};

    /// Scheduler backed by `tokio::time::sleep` tasks.
    ///
    /// Must be used from within a tokio runtime. Cancelling aborts the sleeping
    /// task, so a cancelled callback never runs.
    #[derive(Debug, Default)]
    pub struct TokioScheduler {
        next_handle: TimerHandle,
        timers: HashMap<TimerHandle, AbortHandle>,
    }

    impl TokioScheduler {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Scheduler for TokioScheduler {
        fn schedule_after(&mut self, delay: Duration, callback: TimerCallback) -> TimerHandle {
            self.timers.retain(|_, task| !task.is_finished());
            self.next_handle += 1;
            let handle = self.next_handle;

            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let task = runtime.spawn(async move {
                        tokio::time::sleep(delay).await;
                        callback();
                    });
                    self.timers.insert(handle, task.abort_handle());
                }
                Err(_) => {
                    tracing::error!(?delay, "no tokio runtime; timer dropped");
                }
            }
            handle
        }

        fn cancel(&mut self, handle: TimerHandle) {
            if let Some(task) = self.timers.remove(&handle) {
                task.abort();
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(counter: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> TimerCallback {
        let counter = counter.clone();
        Box::new(move || counter.lock().unwrap().push(label))
    }

    #[test]
    fn fires_in_due_order() {
        let mut scheduler = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        scheduler.schedule_after(Duration::from_millis(300), counting(&order, "late"));
        scheduler.schedule_after(Duration::from_millis(100), counting(&order, "early"));
        scheduler.schedule_after(Duration::from_millis(100), counting(&order, "early-second"));

        assert_eq!(scheduler.advance(Duration::from_millis(99)), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(1)), 2);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.next_due(), Some(Duration::from_millis(200)));
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 1);

        assert_eq!(*order.lock().unwrap(), vec!["early", "early-second", "late"]);
        assert_eq!(scheduler.now(), Duration::from_millis(1_100));
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handle = scheduler.schedule_after(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        scheduler.cancel(handle);
        scheduler.advance(Duration::from_secs(1));

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.requested_delays(), vec![Duration::from_millis(10)]);
    }

    #[test]
    fn callbacks_may_schedule_within_window() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let mut inner = scheduler.clone();
        let counter = fired.clone();
        let mut outer = scheduler.clone();
        outer.schedule_after(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let counter = counter.clone();
                inner.schedule_after(
                    Duration::from_millis(10),
                    Box::new(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        assert_eq!(scheduler.advance(Duration::from_millis(25)), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
