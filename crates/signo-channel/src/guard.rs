use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const FREE: u64 = 0;

/// Advisory single-slot token serializing connection attempts.
///
/// Share one guard (by cloning it) between managers that talk to the same
/// logical endpoint to keep them from opening connections at the same time
/// during startup races. The guard never blocks: a manager that finds the slot
/// taken defers its connect and tries again later.
#[derive(Debug, Clone, Default)]
pub struct ConnectGuard {
    owner: Arc<AtomicU64>,
}

impl ConnectGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot for `owner`. Re-acquiring a slot already held succeeds.
    ///
    /// `owner` must be non-zero.
    pub fn try_acquire(&self, owner: u64) -> bool {
        debug_assert_ne!(owner, FREE, "owner id 0 is reserved");
        match self
            .owner
            .compare_exchange(FREE, owner, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(current) => current == owner,
        }
    }

    /// Free the slot if `owner` holds it.
    pub fn release(&self, owner: u64) -> bool {
        self.owner
            .compare_exchange(owner, FREE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Option<u64> {
        match self.owner.load(Ordering::Acquire) {
            FREE => None,
            owner => Some(owner),
        }
    }

    pub fn is_held(&self) -> bool {
        self.holder().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_slot() {
        let guard = ConnectGuard::new();
        let shared = guard.clone();

        assert!(guard.try_acquire(1));
        assert!(guard.try_acquire(1));
        assert!(!shared.try_acquire(2));
        assert_eq!(shared.holder(), Some(1));

        assert!(!shared.release(2));
        assert!(guard.release(1));
        assert!(!guard.is_held());
        assert!(shared.try_acquire(2));
    }
}
