//! Simulator - Wiring Workers, Detector, and Shutdown
//!
//! # Lifecycle
//!
//! ```text
//! Simulator::new(config)           allocate state, split seeds
//!     │
//!     ├─ shutdown_handle()         hand to a timer / signal handler
//!     │
//!     └─ run()                     spawn worker-0..N-1 + deadlock-detector
//!            │                     block until the detector exits
//!            ├─ join detector      (after ShutdownHandle::trigger)
//!            ├─ join workers
//!            └─ SimulationReport
//! ```
//!
//! `run` never returns on its own. Something must call
//! [`ShutdownHandle::trigger`].

use super::detector::DeadlockDetector;
use super::observers::TracingObserver;
use super::worker::{Worker, WorkerTiming};
use crate::domain::{
    ResourceState, SimulationConfig, SimulationObserver, SimulationReport, ThreadId,
};
use crate::infrastructure::{ResourceMonitor, ShutdownHandle, SimRng};
use std::any::Any;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::info;

/// Name of the detector thread
pub const DETECTOR_THREAD_NAME: &str = "deadlock-detector";

/// Failures while running a simulation
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The OS refused to start a thread
    #[error("Failed to spawn thread '{name}': {source}")]
    Spawn {
        /// Thread that could not be started
        name: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// A worker or the detector panicked
    #[error("Thread '{name}' panicked: {message}")]
    ThreadPanicked {
        /// Thread that panicked
        name: String,
        /// Panic payload, if it was a string
        message: String,
    },
}

/// A configured, not yet started simulation
///
/// # Example
///
/// ```rust
/// use stalemate_twin::adapters::Simulator;
/// use stalemate_twin::domain::SimulationConfig;
/// use std::time::Duration;
///
/// let config = SimulationConfig::builder()
///     .num_threads(3)
///     .resource("r0", 2)
///     .resource("r1", 2)
///     .detection_interval(Duration::from_millis(10))
///     .max_think_time(Duration::from_millis(1))
///     .build()
///     .unwrap();
///
/// let sim = Simulator::new(config);
/// let stop = sim.shutdown_handle();
/// std::thread::spawn(move || {
///     std::thread::sleep(Duration::from_millis(100));
///     stop.trigger();
/// });
///
/// let report = sim.run().unwrap();
/// assert!(report.detector_ticks >= 1);
/// ```
pub struct Simulator {
    config: SimulationConfig,
    monitor: Arc<ResourceMonitor>,
    observer: Arc<dyn SimulationObserver>,
    streams: Vec<SimRng>,
}

impl Simulator {
    /// Create a simulation that logs through `tracing`
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a simulation reporting to a custom observer
    pub fn with_observer(
        config: SimulationConfig,
        observer: Arc<dyn SimulationObserver>,
    ) -> Self {
        let state = ResourceState::new(config.resource_types(), config.num_threads());
        let streams = SimRng::split(config.seed(), config.num_threads());

        Self {
            monitor: Arc::new(ResourceMonitor::new(state)),
            observer,
            streams,
            config,
        }
    }

    /// Configuration this simulation was built from
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Shared monitor, for inspecting state from outside
    pub fn monitor(&self) -> Arc<ResourceMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Handle that stops [`run`](Self::run)
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.monitor))
    }

    /// Start every thread and block until shutdown
    ///
    /// # Errors
    ///
    /// - `Spawn`: a thread could not be started (already started threads
    ///   are stopped and joined first)
    /// - `ThreadPanicked`: a worker or the detector panicked
    pub fn run(self) -> Result<SimulationReport, SimulationError> {
        let Self {
            config,
            monitor,
            observer,
            streams,
        } = self;

        let start = Instant::now();
        let cycles = Arc::new(AtomicU64::new(0));
        let (hold_min, hold_max) = config.hold_time_range();
        let timing = WorkerTiming {
            max_think: config.max_think_time(),
            hold_min,
            hold_max,
        };

        info!(
            threads = config.num_threads(),
            resources = config.resources().len(),
            heuristic = %config.heuristic(),
            interval_ms = config.detection_interval().as_millis() as u64,
            seed = config.seed(),
            "🚀 Simulation started"
        );

        let mut workers = Vec::with_capacity(config.num_threads());
        for (i, rng) in streams.into_iter().enumerate() {
            let worker = Worker::new(
                ThreadId(i),
                Arc::clone(&monitor),
                Arc::clone(&observer),
                rng,
                timing,
                Arc::clone(&cycles),
            );
            match spawn(format!("worker-{i}"), move || worker.run()) {
                Ok(handle) => workers.push(handle),
                Err(e) => return Err(abort(&monitor, workers, e)),
            }
        }

        let detector = DeadlockDetector::new(
            Arc::clone(&monitor),
            Arc::clone(&observer),
            config.heuristic(),
            config.detection_interval(),
            start,
        );
        let detector = match spawn(DETECTOR_THREAD_NAME.to_string(), move || detector.run()) {
            Ok(handle) => handle,
            Err(e) => return Err(abort(&monitor, workers, e)),
        };

        let stats = join(detector);
        if stats.is_err() {
            monitor.shutdown();
        }
        let workers_joined = join_all(workers);
        let stats = stats?;
        workers_joined?;

        let report = SimulationReport::new(
            &stats,
            cycles.load(Ordering::Relaxed),
            start.elapsed(),
            monitor.snapshot(),
        );

        info!(
            total_deadlocks = report.total_deadlocks,
            preemptions = report.total_preemptions,
            cycles = report.cycles_completed,
            "🏁 Simulation stopped"
        );

        Ok(report)
    }
}

struct Named<T> {
    name: String,
    handle: JoinHandle<T>,
}

fn spawn<T, F>(name: String, f: F) -> Result<Named<T>, SimulationError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .map(|handle| Named {
            name: name.clone(),
            handle,
        })
        .map_err(|source| SimulationError::Spawn { name, source })
}

fn join<T>(thread: Named<T>) -> Result<T, SimulationError> {
    thread
        .handle
        .join()
        .map_err(|payload| SimulationError::ThreadPanicked {
            name: thread.name,
            message: panic_message(payload.as_ref()),
        })
}

/// Join every thread; report the first panic
fn join_all(threads: Vec<Named<()>>) -> Result<(), SimulationError> {
    let mut first = Ok(());
    for thread in threads {
        if let Err(e) = join(thread) {
            if first.is_ok() {
                first = Err(e);
            }
        }
    }
    first
}

fn abort(
    monitor: &ResourceMonitor,
    started: Vec<Named<()>>,
    error: SimulationError,
) -> SimulationError {
    monitor.shutdown();
    // the spawn failure takes precedence over any panic among started workers
    let _ = join_all(started);
    error
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Heuristic, NoOpObserver, RecordingObserver, SimEvent};
    use std::time::Duration;

    fn contended_config(seed: u64) -> SimulationConfig {
        SimulationConfig::builder()
            .num_threads(4)
            .resource("r0", 2)
            .resource("r1", 2)
            .detection_interval(Duration::from_millis(5))
            .max_think_time(Duration::from_millis(1))
            .heuristic(Heuristic::MaxTotal)
            .seed(seed)
            .build()
            .unwrap()
    }

    #[test]
    fn test_run_stops_on_trigger_and_conserves() {
        let observer = Arc::new(RecordingObserver::new());
        let sim = Simulator::with_observer(contended_config(1), observer.clone());
        let stop = sim.shutdown_handle();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            stop.trigger();
        });

        let report = sim.run().unwrap();
        stopper.join().unwrap();

        assert!(report.detector_ticks > 0);
        let preempted = observer.count(|e| matches!(e, SimEvent::VictimPreempted { .. }));
        assert_eq!(report.total_preemptions, preempted as u64);
        assert!(report.total_deadlocks <= report.total_preemptions);

        for (r, ty) in report.final_state.resources.iter().enumerate() {
            let held: u32 = report.final_state.allocation.iter().map(|row| row[r]).sum();
            assert_eq!(report.final_state.available[r] + held, ty.max_instances);
        }
    }

    #[test]
    fn test_trigger_before_run_returns_promptly() {
        let sim = Simulator::with_observer(contended_config(2), Arc::new(NoOpObserver));
        assert_eq!(sim.config().num_threads(), 4);
        let monitor = sim.monitor();
        sim.shutdown_handle().trigger();

        let start = Instant::now();
        let report = sim.run().unwrap();

        assert!(monitor.is_shutdown());
        assert_eq!(monitor.snapshot(), report.final_state);

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(report.detector_ticks, 0);
        assert_eq!(report.total_deadlocks, 0);
        assert_eq!(report.average_secs_between_deadlocks, None);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
