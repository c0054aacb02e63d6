//! Worker - One Thread Running the Allocation Protocol
//!
//! ```text
//! loop {
//!     lock: need[r] := rand[0, max[r]] for all r        (0 => satisfied)
//!     while some r unsatisfied:
//!         r   := random unsatisfied type
//!         lock: ask := rand[0, request[t][r]]
//!               while ask > available[r]: wait(changed)
//!               grant(t, r)
//!         pause rand[0, max_think)
//!     pause rand[0.7 d, 1.5 d]
//!     lock: release_all(t); broadcast
//! }
//! ```
//!
//! A preempted worker finds its rows zeroed the next time it holds the
//! lock: its pending ask completes at quantity zero, every remaining type
//! reports satisfied, and the cycle falls through to release.
//!
//! Every lock wait and every pause observes the shutdown flag. After seeing
//! it the worker returns without touching the state again.

use crate::domain::{ResourceId, SimEvent, SimulationObserver, ThreadId};
use crate::infrastructure::{ResourceMonitor, SimRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Timing bounds shared by every worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTiming {
    /// Upper bound (exclusive) of the pause between two asks
    pub max_think: Duration,
    /// Lower bound of the hold pause before release
    pub hold_min: Duration,
    /// Upper bound of the hold pause before release
    pub hold_max: Duration,
}

/// State owned by one worker thread
pub struct Worker {
    id: ThreadId,
    monitor: Arc<ResourceMonitor>,
    observer: Arc<dyn SimulationObserver>,
    rng: SimRng,
    timing: WorkerTiming,
    cycles: Arc<AtomicU64>,
}

impl Worker {
    /// Create worker `id` with its own random stream
    ///
    /// `cycles` is incremented once per completed need-cycle.
    pub fn new(
        id: ThreadId,
        monitor: Arc<ResourceMonitor>,
        observer: Arc<dyn SimulationObserver>,
        rng: SimRng,
        timing: WorkerTiming,
        cycles: Arc<AtomicU64>,
    ) -> Self {
        Self {
            id,
            monitor,
            observer,
            rng,
            timing,
            cycles,
        }
    }

    /// Worker identity
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Run need-cycles until shutdown
    pub fn run(mut self) {
        tracing::debug!(thread = %self.id, "worker started");
        while self.run_cycle() {
            self.cycles.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(thread = %self.id, "worker stopped");
    }

    /// One full need / acquire / hold / release cycle
    ///
    /// Returns `false` as soon as shutdown is observed.
    pub fn run_cycle(&mut self) -> bool {
        let Some(mut unsatisfied) = self.generate_need() else {
            return false;
        };

        while !unsatisfied.is_empty() {
            let slot = self.rng.gen_index(unsatisfied.len());
            match self.acquire(unsatisfied[slot]) {
                None => return false,
                Some(true) => {
                    unsatisfied.swap_remove(slot);
                }
                Some(false) => {}
            }

            let think = self.rng.gen_duration_below(self.timing.max_think);
            if !self.monitor.pause(think) {
                return false;
            }
        }

        let hold = self
            .rng
            .gen_duration_between(self.timing.hold_min, self.timing.hold_max);
        if !self.monitor.pause(hold) {
            return false;
        }

        self.release();
        true
    }

    /// Draw a fresh need for every type; returns the types still to acquire
    fn generate_need(&mut self) -> Option<Vec<ResourceId>> {
        let mut state = self.monitor.lock();
        if self.monitor.is_shutdown() {
            return None;
        }

        let mut need = Vec::with_capacity(state.num_resources());
        for r in (0..state.num_resources()).map(ResourceId) {
            let drawn = self.rng.gen_inclusive(state.max_instances(r));
            state.set_need(self.id, r, drawn);
            need.push(drawn);
        }

        let unsatisfied = need
            .iter()
            .enumerate()
            .filter(|&(_, &n)| n > 0)
            .map(|(r, _)| ResourceId(r))
            .collect();

        self.observer.on_event(&SimEvent::NeedGenerated {
            thread: self.id,
            need,
        });

        Some(unsatisfied)
    }

    /// Ask for part of the outstanding need for `resource`, blocking until it fits
    ///
    /// Returns whether the type is now satisfied, or `None` on shutdown.
    fn acquire(&mut self, resource: ResourceId) -> Option<bool> {
        let mut state = self.monitor.lock();
        if self.monitor.is_shutdown() {
            return None;
        }

        let draw = self.rng.gen_inclusive(state.remaining(self.id, resource));
        let requested = state.begin_request(self.id, resource, draw);

        if !state.can_grant(self.id, resource) {
            self.observer.on_event(&SimEvent::Blocked {
                thread: self.id,
                resource,
                requested,
                available: state.available()[resource.as_usize()],
            });
        }

        while !state.can_grant(self.id, resource) {
            if self.monitor.is_shutdown() {
                return None;
            }
            self.monitor.wait(&mut state);
        }

        let grant = state.grant(self.id, resource);
        if grant.quantity > 0 {
            self.observer.on_event(&SimEvent::Granted {
                thread: self.id,
                resource,
                quantity: grant.quantity,
            });
        }

        Some(grant.satisfied)
    }

    /// Return everything held and wake blocked workers
    fn release(&mut self) {
        let mut state = self.monitor.lock();

        for returned in state.release_all(self.id) {
            self.observer.on_event(&SimEvent::Released {
                thread: self.id,
                resource: returned.resource,
                quantity: returned.quantity,
            });
        }

        self.monitor.broadcast();
        self.observer.on_event(&SimEvent::Restarted { thread: self.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecordingObserver, ResourceState, ResourceType};
    use std::thread;
    use std::time::Instant;

    fn timing() -> WorkerTiming {
        WorkerTiming {
            max_think: Duration::ZERO,
            hold_min: Duration::ZERO,
            hold_max: Duration::from_millis(1),
        }
    }

    fn single_worker(
        types: Vec<ResourceType>,
    ) -> (Worker, Arc<ResourceMonitor>, Arc<RecordingObserver>) {
        worker_on(ResourceState::new(types, 1))
    }

    fn worker_on(
        state: ResourceState,
    ) -> (Worker, Arc<ResourceMonitor>, Arc<RecordingObserver>) {
        let monitor = Arc::new(ResourceMonitor::new(state));
        let observer = Arc::new(RecordingObserver::new());
        let worker = Worker::new(
            ThreadId(0),
            Arc::clone(&monitor),
            observer.clone(),
            SimRng::new(5),
            timing(),
            Arc::new(AtomicU64::new(0)),
        );
        (worker, monitor, observer)
    }

    #[test]
    fn test_lone_worker_completes_cycles() {
        let (mut worker, monitor, observer) =
            single_worker(vec![ResourceType::new("a", 3), ResourceType::new("b", 2)]);

        for _ in 0..10 {
            assert!(worker.run_cycle());
            let state = monitor.lock();
            assert!(state.holds_nothing(ThreadId(0)));
            assert!(state.check_conservation().is_ok());
        }

        assert_eq!(observer.count(|e| matches!(e, SimEvent::Restarted { .. })), 10);
        assert_eq!(observer.count(|e| matches!(e, SimEvent::Blocked { .. })), 0);
    }

    #[test]
    fn test_granted_equals_released_per_cycle() {
        let (mut worker, _monitor, observer) = single_worker(vec![ResourceType::new("a", 5)]);
        assert!(worker.run_cycle());

        let granted: u32 = observer
            .events()
            .iter()
            .filter_map(|e| match e {
                SimEvent::Granted { quantity, .. } => Some(*quantity),
                _ => None,
            })
            .sum();
        let released: u32 = observer
            .events()
            .iter()
            .filter_map(|e| match e {
                SimEvent::Released { quantity, .. } => Some(*quantity),
                _ => None,
            })
            .sum();
        let needed: u32 = observer
            .events()
            .iter()
            .find_map(|e| match e {
                SimEvent::NeedGenerated { need, .. } => Some(need.iter().sum()),
                _ => None,
            })
            .unwrap();

        assert_eq!(granted, needed);
        assert_eq!(released, needed);
    }

    #[test]
    fn test_shutdown_stops_cycle_without_release() {
        let (mut worker, monitor, _observer) = single_worker(vec![ResourceType::new("a", 2)]);
        monitor.shutdown();
        assert!(!worker.run_cycle());
        assert!(monitor.lock().holds_nothing(ThreadId(0)));
    }

    #[test]
    fn test_zero_capacity_type_never_blocks() {
        let (mut worker, _monitor, observer) = single_worker(vec![ResourceType::new("none", 0)]);
        assert!(worker.run_cycle());
        assert_eq!(observer.count(|e| matches!(e, SimEvent::Granted { .. })), 0);
    }

    #[test]
    fn test_preempted_while_blocked_falls_through_to_restart() {
        // t1 holds all of "busy"; t0 can only ever be granted "free"
        let state = ResourceState::from_parts(
            vec![ResourceType::new("busy", 2), ResourceType::new("free", 2)],
            vec![vec![0, 0], vec![2, 0]],
            vec![vec![0, 0], vec![0, 0]],
        )
        .unwrap();
        let (mut worker, monitor, observer) = worker_on(state);
        let id = worker.id();
        let is_blocked =
            move |e: &SimEvent| matches!(e, SimEvent::Blocked { thread, .. } if *thread == id);

        let runner = {
            let observer = Arc::clone(&observer);
            thread::spawn(move || loop {
                let blocked_before = observer.count(is_blocked);
                if !worker.run_cycle() {
                    return false;
                }
                if observer.count(is_blocked) > blocked_before {
                    return true;
                }
            })
        };

        let deadline = Instant::now() + Duration::from_secs(10);
        while observer.count(is_blocked) == 0 {
            assert!(Instant::now() < deadline, "worker never blocked");
            thread::sleep(Duration::from_millis(1));
        }

        // Blocked is emitted under the lock right before waiting, so once we
        // hold the lock the worker is parked
        {
            let mut state = monitor.lock();
            assert!(state.current_request(id, ResourceId(0)) > 0);
            state.preempt(id);
            monitor.broadcast();
        }

        assert!(runner.join().unwrap(), "cycle must complete after preemption");

        let state = monitor.lock();
        assert!(state.holds_nothing(id));
        assert!(state.request_row(id).iter().all(|&n| n == 0));
        assert_eq!(state.current_request(id, ResourceId(0)), 0);
        assert_eq!(state.allocation_row(ThreadId(1)), &[2, 0]);
        assert!(state.check_conservation().is_ok());

        let events = observer.events();
        let last_block = events.iter().rposition(|e| is_blocked(e)).unwrap();
        assert!(events[last_block..]
            .iter()
            .any(|e| matches!(e, SimEvent::Restarted { thread } if *thread == id)));
    }
}
