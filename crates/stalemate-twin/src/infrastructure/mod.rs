//! Infrastructure Layer - Threads, Locks, Randomness
//!
//! Concrete machinery the domain layer deliberately knows nothing about:
//!
//! - `monitor`: the shared state behind one `parking_lot` mutex, the
//!   broadcast condition workers block on, and the shutdown flag
//! - `rng`: deterministic per-thread random streams derived from one seed

pub mod monitor;
pub mod rng;

pub use monitor::{ResourceMonitor, ShutdownHandle};
pub use rng::SimRng;
