//! ResourceMonitor - One Lock, One Broadcast Condition
//!
//! # Synchronisation Model
//!
//! ```text
//! ResourceMonitor
//!   ├─ state:    Mutex<ResourceState>   every read and write of the matrices
//!   ├─ changed:  Condvar                workers blocked on an ask
//!   ├─ shutdown: AtomicBool             run-wide stop flag
//!   └─ pause:    Mutex<()> + Condvar    interruptible think/hold pauses
//! ```
//!
//! Wakes on `changed` are always broadcast (`notify_all`) and never
//! targeted, so every waiter must re-check its own predicate in a loop.
//! The state lock is never held across a pause.
//!
//! # Shutdown Ordering
//!
//! [`ResourceMonitor::shutdown`] stores the flag *before* taking either
//! lock and notifying. A waiter checks the flag under the same lock it
//! waits with, so it either sees the flag or is already parked when the
//! broadcast arrives. No wake can be lost.

use crate::domain::{ResourceState, StateSnapshot};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared resource state plus the primitives that guard it
#[derive(Debug)]
pub struct ResourceMonitor {
    state: Mutex<ResourceState>,
    changed: Condvar,
    shutdown: AtomicBool,
    pause_lock: Mutex<()>,
    pause_cv: Condvar,
}

impl ResourceMonitor {
    /// Take ownership of a freshly initialised state
    pub fn new(state: ResourceState) -> Self {
        Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
            shutdown: AtomicBool::new(false),
            pause_lock: Mutex::new(()),
            pause_cv: Condvar::new(),
        }
    }

    /// Acquire the state lock
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, ResourceState> {
        self.state.lock()
    }

    /// Release the lock, park until the next broadcast, then re-acquire
    ///
    /// Spurious wakes are possible. Callers loop on their own predicate.
    #[inline]
    pub fn wait(&self, guard: &mut MutexGuard<'_, ResourceState>) {
        self.changed.wait(guard);
    }

    /// Wake every thread parked in [`wait`](Self::wait)
    #[inline]
    pub fn broadcast(&self) {
        self.changed.notify_all();
    }

    /// Copy of the current matrices
    pub fn snapshot(&self) -> StateSnapshot {
        self.lock().snapshot()
    }

    /// `true` once shutdown has been requested
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Request shutdown and wake every waiter and every pause
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);

        {
            let _state = self.state.lock();
            self.changed.notify_all();
        }

        let _pause = self.pause_lock.lock();
        self.pause_cv.notify_all();
    }

    /// Sleep for `duration` without holding the state lock
    ///
    /// Returns `false` if shutdown was requested before or during the
    /// pause, `true` if the full duration elapsed. A duration too large to
    /// express as a deadline waits for shutdown.
    pub fn pause(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        let mut guard = self.pause_lock.lock();

        while !self.is_shutdown() {
            match deadline {
                Some(deadline) => {
                    if self.pause_cv.wait_until(&mut guard, deadline).timed_out() {
                        return !self.is_shutdown();
                    }
                }
                None => self.pause_cv.wait(&mut guard),
            }
        }
        false
    }
}

/// Cloneable handle that stops a running simulation
///
/// # Example
///
/// ```rust
/// use stalemate_twin::domain::{ResourceState, ResourceType};
/// use stalemate_twin::infrastructure::{ResourceMonitor, ShutdownHandle};
/// use std::sync::Arc;
///
/// let state = ResourceState::new(vec![ResourceType::new("r", 1)], 1);
/// let monitor = Arc::new(ResourceMonitor::new(state));
/// let handle = ShutdownHandle::new(Arc::clone(&monitor));
///
/// handle.trigger();
/// assert!(monitor.is_shutdown());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    monitor: Arc<ResourceMonitor>,
}

impl ShutdownHandle {
    /// Wrap a shared monitor
    pub fn new(monitor: Arc<ResourceMonitor>) -> Self {
        Self { monitor }
    }

    /// Stop workers and the detector at their next safe point
    pub fn trigger(&self) {
        self.monitor.shutdown();
    }

    /// `true` once [`trigger`](Self::trigger) has been called
    pub fn is_triggered(&self) -> bool {
        self.monitor.is_shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ResourceId, ResourceType, ThreadId};
    use std::thread;

    fn monitor() -> Arc<ResourceMonitor> {
        let state = ResourceState::new(vec![ResourceType::new("r", 2)], 2);
        Arc::new(ResourceMonitor::new(state))
    }

    #[test]
    fn test_pause_runs_to_completion() {
        let m = monitor();
        let start = Instant::now();
        assert!(m.pause(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_shutdown_interrupts_pause() {
        let m = monitor();
        let sleeper = {
            let m = Arc::clone(&m);
            thread::spawn(move || m.pause(Duration::from_secs(30)))
        };

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        m.shutdown();

        assert!(!sleeper.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!m.pause(Duration::from_secs(30)), "pause after shutdown returns at once");
    }

    #[test]
    fn test_unbounded_pause_waits_for_shutdown() {
        let m = monitor();
        let sleeper = {
            let m = Arc::clone(&m);
            thread::spawn(move || m.pause(Duration::MAX))
        };

        thread::sleep(Duration::from_millis(20));
        m.shutdown();

        assert!(!sleeper.join().unwrap());
    }

    #[test]
    fn test_shutdown_wakes_blocked_waiter() {
        let m = monitor();
        {
            let mut state = m.lock();
            state.set_need(ThreadId(0), ResourceId(0), 2);
            state.begin_request(ThreadId(0), ResourceId(0), 2);
            state.grant(ThreadId(0), ResourceId(0));
            state.set_need(ThreadId(1), ResourceId(0), 1);
            state.begin_request(ThreadId(1), ResourceId(0), 1);
        }

        let waiter = {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                let mut state = m.lock();
                while !state.can_grant(ThreadId(1), ResourceId(0)) {
                    if m.is_shutdown() {
                        return false;
                    }
                    m.wait(&mut state);
                }
                true
            })
        };

        thread::sleep(Duration::from_millis(20));
        ShutdownHandle::new(Arc::clone(&m)).trigger();

        assert!(!waiter.join().unwrap());
    }

    #[test]
    fn test_broadcast_wakes_after_release() {
        let m = monitor();
        {
            let mut state = m.lock();
            state.set_need(ThreadId(0), ResourceId(0), 2);
            state.begin_request(ThreadId(0), ResourceId(0), 2);
            state.grant(ThreadId(0), ResourceId(0));
            state.set_need(ThreadId(1), ResourceId(0), 2);
            state.begin_request(ThreadId(1), ResourceId(0), 2);
        }

        let waiter = {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                let mut state = m.lock();
                while !state.can_grant(ThreadId(1), ResourceId(0)) {
                    m.wait(&mut state);
                }
                state.grant(ThreadId(1), ResourceId(0)).quantity
            })
        };

        thread::sleep(Duration::from_millis(20));
        {
            let mut state = m.lock();
            state.release_all(ThreadId(0));
            m.broadcast();
        }

        assert_eq!(waiter.join().unwrap(), 2);
        assert!(m.lock().check_conservation().is_ok());
    }
}
