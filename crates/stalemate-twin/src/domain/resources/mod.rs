//! Resource Accounting
//!
//! # Architecture
//!
//! This module owns the data model every other component reads:
//!
//! - `types`: identifiers, resource type descriptors, error types
//! - `state`: [`ResourceState`], the shared matrices plus the atomic
//!   protocol steps (need, ask, grant, release, preempt)
//!
//! Nothing here synchronises. Callers reach the state only through the
//! monitor guard, which is what makes each method call atomic with respect
//! to the other workers and the detector.
//!
//! ```text
//!                 grant ─────────────►
//!   available[r]                        allocation[t][r]
//!                 ◄───── release_all / preempt
//! ```

pub mod state;
pub mod types;

pub use state::{ResourceState, StateSnapshot};
pub use types::{
    ConservationViolation, Grant, Instances, ResourceId, ResourceType, Returned, StateError,
    ThreadId,
};
