//! Deadlock Resolution - Preempt Until Clear
//!
//! ```text
//! set := detect(state)
//! while set /= {}:
//!     v   := heuristic.select(set, allocation)
//!     preempt(v)                 (allocation/request/cur_request rows -> 0)
//!     set := detect(state)
//! ```
//!
//! A preempted victim holds nothing afterwards, so the next pass marks it
//! finished up front and `work` can only grow. The set therefore shrinks by
//! at least one member per round: an initial set of size `k` is cleared in
//! at most `k` rounds.
//!
//! Preemption is resource-level. The victim's worker keeps running and
//! simply sees a zeroed request the next time it takes the lock.

use super::detector::{detect, DeadlockSet};
use super::events::{SimEvent, SimulationObserver};
use super::resources::{ResourceState, Returned, ThreadId};
use super::victim::Heuristic;
use serde::{Deserialize, Serialize};

/// One preemption round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preemption {
    /// Thread whose reservation was rolled back
    pub victim: ThreadId,
    /// Deadlock set the victim was chosen from
    pub deadlocked: DeadlockSet,
    /// Instances returned to the pool
    pub released: Vec<Returned>,
}

/// Break every deadlock in `state`, starting from an already computed set
///
/// Returns one [`Preemption`] per round, in order. An empty `initial` set
/// performs no work.
pub fn resolve(
    state: &mut ResourceState,
    initial: DeadlockSet,
    heuristic: Heuristic,
    observer: &dyn SimulationObserver,
) -> Vec<Preemption> {
    let bound = initial.len();
    let mut rounds = Vec::new();
    let mut deadlocked = initial;

    while let Some(victim) = heuristic.select(&deadlocked, state.allocation()) {
        debug_assert!(rounds.len() < bound, "resolution exceeded {bound} rounds");

        observer.on_event(&SimEvent::DeadlockDetected {
            threads: deadlocked.clone(),
        });

        let released = state.preempt(victim);
        observer.on_event(&SimEvent::VictimPreempted {
            victim,
            heuristic,
            released: released.clone(),
        });

        let next = detect(state);
        rounds.push(Preemption {
            victim,
            deadlocked,
            released,
        });
        deadlocked = next;
    }

    rounds
}
