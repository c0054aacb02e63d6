//! Stalemate Resource-Contention Twin
//!
//! # Overview
//!
//! `stalemate-twin` runs a pool of worker threads that repeatedly acquire
//! random amounts of several countable resource types, and a periodic
//! detector that finds deadlocks in the resulting state and breaks them by
//! preempting a victim.
//!
//! # Trinity Architecture
//!
//! - **Domain**: resource matrices, detection pass, victim heuristics,
//!   resolution loop, configuration, events, statistics. Pure and
//!   single-threaded.
//! - **Infrastructure**: the lock + broadcast condition around the state,
//!   the shutdown flag, deterministic random streams.
//! - **Adapters**: worker and detector threads, the `tracing` observer,
//!   and the [`Simulator`] that wires them together.
//!
//! # Laws
//!
//! - **Conservation**: `available[r] + Σ_t allocation[t][r] == max[r]`
//!   whenever the state lock is held
//! - **Determinism**: detection and victim choice depend only on the
//!   matrices, never on iteration order or timing
//! - **Termination**: resolving a deadlock set of size `k` takes at most
//!   `k` preemptions
//!
//! # Usage
//!
//! ```rust
//! use stalemate_twin::{Heuristic, SimulationConfig, Simulator};
//! use std::time::Duration;
//!
//! let config = SimulationConfig::builder()
//!     .num_threads(4)
//!     .resource("disk", 2)
//!     .resource("tape", 1)
//!     .heuristic(Heuristic::MinTotal)
//!     .detection_interval(Duration::from_millis(10))
//!     .max_think_time(Duration::from_millis(1))
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! let sim = Simulator::new(config);
//! let stop = sim.shutdown_handle();
//! std::thread::spawn(move || {
//!     std::thread::sleep(Duration::from_millis(50));
//!     stop.trigger();
//! });
//!
//! let report = sim.run().unwrap();
//! println!("{} deadlocks", report.total_deadlocks);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

// Trinity Architecture Layers
pub mod adapters;
pub mod domain;
pub mod infrastructure;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Re-export Primary Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// State model
pub use domain::{Instances, ResourceId, ResourceState, ResourceType, StateSnapshot, ThreadId};

// Detection and resolution
pub use domain::{detect, resolve, DeadlockSet, Heuristic, Preemption};

// Configuration and reporting
pub use domain::{
    ConfigError, ResourceSpec, SimulationConfig, SimulationConfigBuilder, SimulationReport,
};

// Observability
pub use domain::{SimEvent, SimulationObserver};

// Runtime
pub use adapters::{SimulationError, Simulator, TracingObserver};
pub use infrastructure::ShutdownHandle;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
