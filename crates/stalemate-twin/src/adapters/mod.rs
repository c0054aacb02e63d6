//! Adapters Layer - Domain Logic on Real Threads
//!
//! - `worker`: the allocation protocol loop, one OS thread per worker
//! - `detector`: the periodic detect / resolve tick
//! - `observers`: `SimEvent` to `tracing`
//! - `simulator`: spawns and joins everything, produces the report

pub mod detector;
pub mod observers;
pub mod simulator;
pub mod worker;

pub use detector::{DeadlockDetector, DetectionOutcome};
pub use observers::TracingObserver;
pub use simulator::{SimulationError, Simulator, DETECTOR_THREAD_NAME};
pub use worker::{Worker, WorkerTiming};
