//! Periodic Deadlock Detector
//!
//! # Tick
//!
//! ```text
//! pause(interval)            (returns early on shutdown)
//! lock
//!   set := detect(state)
//!   if set /= {}:
//!       stats.record_episode(now)
//!       resolve(state, set, heuristic)
//!   broadcast
//! unlock
//! ```
//!
//! One tick counts at most one deadlock episode, however many preemption
//! rounds it takes to clear. Workers are woken once at the end of every
//! tick, deadlock or not.

use crate::domain::{
    detect, resolve, DeadlockSet, DeadlockStats, Heuristic, Preemption, SimEvent,
    SimulationObserver,
};
use crate::infrastructure::ResourceMonitor;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of one detector tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// Every thread could finish
    NoDeadlock,
    /// A deadlock was found and broken
    Resolved {
        /// Deadlock set found by the first pass
        initial: DeadlockSet,
        /// Preemption rounds, in order
        preemptions: Vec<Preemption>,
    },
}

impl DetectionOutcome {
    /// `true` if this tick found a deadlock
    pub fn is_deadlock(&self) -> bool {
        matches!(self, DetectionOutcome::Resolved { .. })
    }
}

/// Detector owned by the `deadlock-detector` thread
pub struct DeadlockDetector {
    monitor: Arc<ResourceMonitor>,
    observer: Arc<dyn SimulationObserver>,
    heuristic: Heuristic,
    interval: Duration,
    stats: DeadlockStats,
}

impl DeadlockDetector {
    /// Create a detector whose first episode is timed from `start`
    pub fn new(
        monitor: Arc<ResourceMonitor>,
        observer: Arc<dyn SimulationObserver>,
        heuristic: Heuristic,
        interval: Duration,
        start: Instant,
    ) -> Self {
        Self {
            monitor,
            observer,
            heuristic,
            interval,
            stats: DeadlockStats::new(start),
        }
    }

    /// Counters so far
    pub fn stats(&self) -> &DeadlockStats {
        &self.stats
    }

    /// Run one detection and resolution pass at time `now`
    pub fn tick(&mut self, now: Instant) -> DetectionOutcome {
        let mut state = self.monitor.lock();
        self.stats.record_tick();
        self.observer.on_event(&SimEvent::DetectionStarted);

        let initial = detect(&state);
        let outcome = if initial.is_empty() {
            self.observer.on_event(&SimEvent::NoDeadlock);
            DetectionOutcome::NoDeadlock
        } else {
            self.stats.record_episode(now);
            let preemptions = resolve(
                &mut state,
                initial.clone(),
                self.heuristic,
                self.observer.as_ref(),
            );
            self.stats.record_preemptions(preemptions.len());
            self.observer.on_event(&SimEvent::DeadlockResolved {
                preemptions: preemptions.len(),
                total_deadlocks: self.stats.episodes(),
            });
            DetectionOutcome::Resolved {
                initial,
                preemptions,
            }
        };

        self.monitor.broadcast();
        outcome
    }

    /// Tick every `interval` until shutdown, then hand back the counters
    pub fn run(mut self) -> DeadlockStats {
        tracing::debug!(
            heuristic = %self.heuristic,
            interval_ms = self.interval.as_millis() as u64,
            "detector started"
        );
        while self.monitor.pause(self.interval) {
            self.tick(Instant::now());
        }
        tracing::debug!(ticks = self.stats.ticks(), "detector stopped");
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecordingObserver, ResourceState, ResourceType, ThreadId};
    use std::thread;

    fn deadlocked_pair() -> ResourceState {
        let resources = vec![ResourceType::new("r0", 1), ResourceType::new("r1", 1)];
        ResourceState::from_parts(
            resources,
            vec![vec![1, 0], vec![0, 1]],
            vec![vec![0, 1], vec![1, 0]],
        )
        .unwrap()
    }

    fn detector(
        state: ResourceState,
        observer: Arc<RecordingObserver>,
    ) -> (DeadlockDetector, Arc<ResourceMonitor>) {
        let monitor = Arc::new(ResourceMonitor::new(state));
        let detector = DeadlockDetector::new(
            Arc::clone(&monitor),
            observer,
            Heuristic::MaxTotal,
            Duration::from_millis(5),
            Instant::now(),
        );
        (detector, monitor)
    }

    #[test]
    fn test_idle_tick_reports_no_deadlock() {
        let state = ResourceState::new(vec![ResourceType::new("r", 2)], 3);
        let observer = Arc::new(RecordingObserver::new());
        let (mut detector, _) = detector(state, observer.clone());

        assert_eq!(detector.tick(Instant::now()), DetectionOutcome::NoDeadlock);
        assert_eq!(detector.stats().episodes(), 0);
        assert_eq!(detector.stats().ticks(), 1);
        assert_eq!(
            observer.events(),
            vec![SimEvent::DetectionStarted, SimEvent::NoDeadlock]
        );
    }

    #[test]
    fn test_tick_resolves_and_counts_one_episode() {
        let observer = Arc::new(RecordingObserver::new());
        let (mut detector, monitor) = detector(deadlocked_pair(), observer.clone());

        let outcome = detector.tick(Instant::now());

        match outcome {
            DetectionOutcome::Resolved { initial, preemptions } => {
                assert_eq!(initial.as_slice(), &[ThreadId(0), ThreadId(1)]);
                assert_eq!(preemptions.len(), 1);
                assert_eq!(preemptions[0].victim, ThreadId(0));
            }
            other => panic!("expected a resolution, got {other:?}"),
        }
        assert_eq!(detector.stats().episodes(), 1);
        assert_eq!(detector.stats().preemptions(), 1);
        assert!(matches!(
            observer.events().last(),
            Some(SimEvent::DeadlockResolved { preemptions: 1, total_deadlocks: 1 })
        ));

        let state = monitor.lock();
        assert!(detect(&state).is_empty());
        assert!(state.check_conservation().is_ok());
    }

    #[test]
    fn test_second_tick_after_resolution_is_clean() {
        let observer = Arc::new(RecordingObserver::new());
        let (mut detector, _) = detector(deadlocked_pair(), observer);

        assert!(detector.tick(Instant::now()).is_deadlock());
        assert!(!detector.tick(Instant::now()).is_deadlock());
        assert_eq!(detector.stats().episodes(), 1);
        assert_eq!(detector.stats().ticks(), 2);
    }

    #[test]
    fn test_run_exits_on_shutdown() {
        let observer = Arc::new(RecordingObserver::new());
        let (detector, monitor) = detector(deadlocked_pair(), observer);

        let handle = thread::spawn(move || detector.run());
        thread::sleep(Duration::from_millis(50));
        monitor.shutdown();

        let stats = handle.join().unwrap();
        assert!(stats.ticks() >= 1);
        assert_eq!(stats.episodes(), 1);
    }
}
