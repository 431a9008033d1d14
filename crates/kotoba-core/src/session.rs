//! One quiz at a time per user.
//!
//! Each user is either idle or in session. [`SessionGuard::try_acquire`]
//! moves idle → in session and never blocks; [`SessionGuard::release`] moves
//! back unconditionally. [`SessionGuard::acquire`] wraps the pair in a lease
//! that releases on drop, covering answer, timeout, error and unwind paths.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::model::UserId;

#[derive(Debug, Default)]
pub struct SessionGuard {
    active: Mutex<HashSet<UserId>>,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<UserId>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `true` if the user was idle and is now in session.
    pub fn try_acquire(&self, user_id: UserId) -> bool {
        let acquired = self.lock().insert(user_id);
        if !acquired {
            tracing::warn!(user_id, "quiz already in progress");
        }
        acquired
    }

    pub fn release(&self, user_id: UserId) {
        self.lock().remove(&user_id);
    }

    pub fn is_active(&self, user_id: UserId) -> bool {
        self.lock().contains(&user_id)
    }

    /// Lease form of [`try_acquire`](Self::try_acquire). `None` when busy.
    pub fn acquire(&self, user_id: UserId) -> Option<SessionLease<'_>> {
        self.try_acquire(user_id).then_some(SessionLease {
            guard: self,
            user_id,
        })
    }
}

/// Held for the duration of one quiz round.
#[derive(Debug)]
pub struct SessionLease<'a> {
    guard: &'a SessionGuard,
    user_id: UserId,
}

impl SessionLease<'_> {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        self.guard.release(self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_second_acquire_is_refused() {
        let guard = SessionGuard::new();
        assert!(guard.try_acquire(1));
        assert!(!guard.try_acquire(1));
        assert!(guard.try_acquire(2));
        guard.release(1);
        assert!(guard.try_acquire(1));
    }

    #[test]
    fn test_release_when_idle_is_harmless() {
        let guard = SessionGuard::new();
        guard.release(5);
        assert!(!guard.is_active(5));
    }

    #[test]
    fn test_lease_releases_on_drop() {
        let guard = SessionGuard::new();
        {
            let lease = guard.acquire(3).unwrap();
            assert_eq!(lease.user_id(), 3);
            assert!(guard.acquire(3).is_none());
        }
        assert!(!guard.is_active(3));
        assert!(guard.acquire(3).is_some());
    }

    #[test]
    fn test_lease_releases_on_unwind() {
        let guard = SessionGuard::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _lease = guard.acquire(9).unwrap();
            panic!("round failed");
        }));
        assert!(result.is_err());
        assert!(!guard.is_active(9));
    }

    #[test]
    fn test_concurrent_acquire_admits_exactly_one() {
        for _ in 0..50 {
            let guard = Arc::new(SessionGuard::new());
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let guard = Arc::clone(&guard);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        guard.try_acquire(77)
                    })
                })
                .collect();
            let wins = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(wins, 1);
        }
    }
}
