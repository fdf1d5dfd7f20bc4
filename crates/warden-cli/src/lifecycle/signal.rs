//! Cross-thread lifecycle signal.
//!
//! A [`LifecycleSynchronizer`] is a binary flag guarded by a mutex and a
//! condition variable. The output pumps set it when the server reaches its
//! first readiness event, and the harness sets it again once a stopped server
//! has been reaped. Waiters block on the condition variable; nothing polls.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

/// State of a [`LifecycleSynchronizer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignalState {
    #[default]
    Cleared,
    Set,
}

/// Returned when a bounded wait expires before the flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("lifecycle signal was not set within {} ms", .timeout.as_millis())]
pub struct SignalTimeout {
    /// The budget that expired.
    pub timeout: Duration,
}

/// Shared readiness flag.
///
/// Clones observe and mutate the same flag.
#[derive(Debug, Clone, Default)]
pub struct LifecycleSynchronizer {
    inner: Arc<(Mutex<SignalState>, Condvar)>,
}

impl LifecycleSynchronizer {
    /// Creates a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every waiter.
    pub fn set(&self) {
        let (_, condvar) = &*self.inner;
        *self.lock() = SignalState::Set;
        condvar.notify_all();
    }

    /// Clears the flag.
    pub fn clear(&self) {
        *self.lock() = SignalState::Cleared;
    }

    /// Current state.
    pub fn state(&self) -> SignalState {
        *self.lock()
    }

    /// Returns true when the flag is set.
    pub fn is_set(&self) -> bool {
        self.state() == SignalState::Set
    }

    /// Blocks until the flag is set.
    pub fn await_ready(&self) {
        let (_, condvar) = &*self.inner;
        let guard = self.lock();
        let _guard = condvar
            .wait_while(guard, |state| *state == SignalState::Cleared)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks until the flag is set or `timeout` elapses.
    pub fn await_ready_within(&self, timeout: Duration) -> Result<(), SignalTimeout> {
        let (_, condvar) = &*self.inner;
        let guard = self.lock();
        let (guard, _) = condvar
            .wait_timeout_while(guard, timeout, |state| *state == SignalState::Cleared)
            .unwrap_or_else(PoisonError::into_inner);
        match *guard {
            SignalState::Set => Ok(()),
            SignalState::Cleared => Err(SignalTimeout { timeout }),
        }
    }

    /// Announces the stop phase: clears the flag, then sets it.
    ///
    /// Observers that cleared the flag after readiness wake up here.
    pub fn signal_stop(&self) {
        self.clear();
        self.set();
    }

    fn lock(&self) -> MutexGuard<'_, SignalState> {
        let (state, _) = &*self.inner;
        state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_cleared() {
        let sync = LifecycleSynchronizer::new();
        assert_eq!(sync.state(), SignalState::Cleared);
        assert!(!sync.is_set());
    }

    #[test]
    fn set_wakes_a_waiting_thread() {
        let sync = LifecycleSynchronizer::new();
        let waiter = {
            let sync = sync.clone();
            thread::spawn(move || sync.await_ready())
        };
        sync.set();
        waiter.join().expect("waiter thread");
        assert!(sync.is_set());
    }

    #[test]
    fn bounded_wait_times_out_while_cleared() {
        let sync = LifecycleSynchronizer::new();
        let error = sync
            .await_ready_within(Duration::from_millis(20))
            .expect_err("flag is never set");
        assert_eq!(error.timeout, Duration::from_millis(20));
    }

    #[test]
    fn bounded_wait_returns_immediately_when_set() {
        let sync = LifecycleSynchronizer::new();
        sync.set();
        assert!(sync.await_ready_within(Duration::ZERO).is_ok());
    }

    #[test]
    fn stop_signal_wakes_observers_that_reset_the_flag() {
        let sync = LifecycleSynchronizer::new();
        sync.set();
        sync.clear();
        let waiter = {
            let sync = sync.clone();
            thread::spawn(move || sync.await_ready_within(Duration::from_secs(10)))
        };
        sync.signal_stop();
        let result = waiter.join().expect("waiter thread");
        assert!(result.is_ok());
        assert_eq!(sync.state(), SignalState::Set);
    }
}
