//! Domain Layer - Allocation, Detection, Resolution
//!
//! # Architecture Overview
//!
//! Everything in this layer is single-threaded and lock-free. Each function
//! takes the state by reference and finishes in bounded time; the
//! infrastructure layer decides when the lock is held around it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  Resources Module              Detector Module              │
//! │  ├─ ResourceState              ├─ detect()                  │
//! │  ├─ ResourceType / Instances   └─ DeadlockSet               │
//! │  └─ ThreadId / ResourceId                                   │
//! │                                                             │
//! │  Victim Module                 Resolver Module              │
//! │  └─ Heuristic (5 variants)     └─ resolve() -> Preemption*  │
//! │                                                             │
//! │  Config Module                 Events / Stats Modules       │
//! │  ├─ SimulationConfig           ├─ SimEvent                  │
//! │  └─ SimulationConfigBuilder    ├─ SimulationObserver        │
//! │                                └─ DeadlockStats / Report    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use stalemate_twin::domain::*;
//!
//! // t0 holds r0 and wants r1, t1 holds r1 and wants r0
//! let resources = vec![ResourceType::new("r0", 1), ResourceType::new("r1", 1)];
//! let mut state = ResourceState::from_parts(
//!     resources,
//!     vec![vec![1, 0], vec![0, 1]],
//!     vec![vec![0, 1], vec![1, 0]],
//! )
//! .unwrap();
//!
//! let deadlocked = detect(&state);
//! assert_eq!(deadlocked.len(), 2);
//!
//! let rounds = resolve(&mut state, deadlocked, Heuristic::Linear, &NoOpObserver);
//! assert_eq!(rounds[0].victim, ThreadId(0));
//! assert!(detect(&state).is_empty());
//! ```

pub mod config;
pub mod detector;
pub mod events;
pub mod resolver;
pub mod resources;
pub mod stats;
pub mod victim;

pub use config::{ConfigError, ResourceSpec, SimulationConfig, SimulationConfigBuilder};
pub use detector::{detect, detect_matrices, DeadlockSet};
pub use events::{NoOpObserver, RecordingObserver, SimEvent, SimulationObserver};
pub use resolver::{resolve, Preemption};
pub use resources::{
    ConservationViolation, Grant, Instances, ResourceId, ResourceState, ResourceType, Returned,
    StateError, StateSnapshot, ThreadId,
};
pub use stats::{DeadlockStats, SimulationReport};
pub use victim::{Heuristic, UnknownHeuristic};
