//! Simulation Events & Observers
//!
//! Workers and the detector report what they do as [`SimEvent`]s through a
//! [`SimulationObserver`]. The core never formats output itself; the
//! observer decides whether an event becomes a log line, a test record, or
//! nothing.
//!
//! Observers are called while the monitor lock is held, so events from one
//! lock acquisition arrive in the order the state changed. Implementations
//! must be cheap and must never call back into the simulator.
//!
//! | Observer              | Where                      | Use               |
//! |-----------------------|----------------------------|-------------------|
//! | [`NoOpObserver`]      | here                       | benchmarks        |
//! | [`RecordingObserver`] | here                       | tests             |
//! | `TracingObserver`     | `adapters::observers`      | console logging   |

use super::detector::DeadlockSet;
use super::resources::{Instances, ResourceId, Returned, ThreadId};
use super::victim::Heuristic;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Something observable happened in the simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// A worker drew a fresh need for every resource type
    NeedGenerated {
        /// Worker
        thread: ThreadId,
        /// Need per resource type
        need: Vec<Instances>,
    },

    /// Instances moved from the pool to a worker
    Granted {
        /// Worker
        thread: ThreadId,
        /// Resource type
        resource: ResourceId,
        /// Instances granted (never zero)
        quantity: Instances,
    },

    /// A worker's ask did not fit the pool and it suspended
    Blocked {
        /// Worker
        thread: ThreadId,
        /// Resource type
        resource: ResourceId,
        /// Instances asked for
        requested: Instances,
        /// Instances in the pool at the time
        available: Instances,
    },

    /// A worker returned instances at the end of its cycle
    Released {
        /// Worker
        thread: ThreadId,
        /// Resource type
        resource: ResourceId,
        /// Instances returned (never zero)
        quantity: Instances,
    },

    /// A worker finished its cycle and starts over
    Restarted {
        /// Worker
        thread: ThreadId,
    },

    /// The detector took the lock for a periodic check
    DetectionStarted,

    /// The periodic check found every thread able to finish
    NoDeadlock,

    /// A detection pass found threads that cannot finish
    DeadlockDetected {
        /// Members of the deadlock set
        threads: DeadlockSet,
    },

    /// A victim's reservation was rolled back
    VictimPreempted {
        /// Preempted worker
        victim: ThreadId,
        /// Heuristic that picked it
        heuristic: Heuristic,
        /// Instances returned to the pool
        released: Vec<Returned>,
    },

    /// Every deadlock found in this tick has been broken
    DeadlockResolved {
        /// Preemption rounds used in this tick
        preemptions: usize,
        /// Deadlock episodes so far, this one included
        total_deadlocks: u64,
    },
}

/// Sink for [`SimEvent`]s
///
/// # Contract
///
/// - Called with the monitor lock held
/// - Must not block for long and must not re-enter the simulator
pub trait SimulationObserver: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: &SimEvent);
}

/// Observer that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl SimulationObserver for NoOpObserver {
    #[inline(always)]
    fn on_event(&self, _event: &SimEvent) {}
}

/// Observer that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SimEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<SimEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&SimEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Drop everything recorded so far
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl SimulationObserver for RecordingObserver {
    fn on_event(&self, event: &SimEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.on_event(&SimEvent::DetectionStarted);
        observer.on_event(&SimEvent::NoDeadlock);

        assert_eq!(observer.events(), vec![SimEvent::DetectionStarted, SimEvent::NoDeadlock]);
        assert_eq!(observer.count(|e| matches!(e, SimEvent::NoDeadlock)), 1);

        observer.clear();
        assert!(observer.events().is_empty());
    }

    #[test]
    fn test_observers_are_object_safe() {
        let observers: Vec<Box<dyn SimulationObserver>> =
            vec![Box::new(NoOpObserver), Box::new(RecordingObserver::new())];
        for o in &observers {
            o.on_event(&SimEvent::Restarted { thread: ThreadId(0) });
        }
    }
}
