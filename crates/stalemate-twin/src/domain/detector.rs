//! Deadlock Detection - Fixed-Point Reachability Pass
//!
//! # Algorithm
//!
//! The detection analogue of the Banker's safety check, applied to the
//! *current* allocation and remaining requests:
//!
//! ```text
//! work     := available
//! finished := { t | allocation[t] == 0 }
//!
//! repeat
//!     for t not in finished:
//!         if request[t] <= work (element-wise):
//!             work     += allocation[t]
//!             finished += { t }
//! until a full sweep finishes nobody
//!
//! deadlocked := Threads \ finished        (ascending index)
//! ```
//!
//! # Order Independence
//!
//! `work` only grows, so a thread that can finish at some point in a sweep
//! can still finish at any later point. The final `finished` set is
//! therefore the same whatever order threads are visited in; only the
//! number of sweeps differs.

use super::resources::{Instances, ResourceState, ThreadId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Threads that cannot reach completion, in ascending index order
///
/// Transient: produced by one [`detect`] pass and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlockSet(Vec<ThreadId>);

impl DeadlockSet {
    /// Build a set from thread ids, sorting and de-duplicating them
    pub fn from_threads(threads: impl IntoIterator<Item = ThreadId>) -> Self {
        let mut threads: Vec<ThreadId> = threads.into_iter().collect();
        threads.sort_unstable();
        threads.dedup();
        Self(threads)
    }

    /// `true` when no deadlock exists
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of deadlocked threads
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Lowest-index member
    pub fn first(&self) -> Option<ThreadId> {
        self.0.first().copied()
    }

    /// Membership test
    pub fn contains(&self, thread: ThreadId) -> bool {
        self.0.binary_search(&thread).is_ok()
    }

    /// Members in ascending order
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.0.iter().copied()
    }

    /// Members as a slice
    pub fn as_slice(&self) -> &[ThreadId] {
        &self.0
    }
}

impl fmt::Display for DeadlockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", t.as_usize())?;
        }
        Ok(())
    }
}

/// Run one detection pass over the state
pub fn detect(state: &ResourceState) -> DeadlockSet {
    detect_matrices(state.available(), state.allocation(), state.request())
}

/// Detection pass over raw matrices
///
/// Exposed separately so benchmarks and property tests can drive the
/// algorithm without building a full [`ResourceState`].
pub fn detect_matrices(
    available: &[Instances],
    allocation: &[Vec<Instances>],
    request: &[Vec<Instances>],
) -> DeadlockSet {
    let mut work: Vec<u64> = available.iter().map(|&n| u64::from(n)).collect();
    let mut finished: Vec<bool> = allocation
        .iter()
        .map(|row| row.iter().all(|&n| n == 0))
        .collect();

    loop {
        let mut progressed = false;

        for t in 0..allocation.len() {
            if finished[t] {
                continue;
            }

            let fits = request[t]
                .iter()
                .zip(&work)
                .all(|(&need, &have)| u64::from(need) <= have);

            if fits {
                for (w, &held) in work.iter_mut().zip(&allocation[t]) {
                    *w += u64::from(held);
                }
                finished[t] = true;
                progressed = true;
            }
        }

        if !progressed {
            break;
        }
    }

    DeadlockSet(
        finished
            .iter()
            .enumerate()
            .filter(|&(_, done)| !*done)
            .map(|(t, _)| ThreadId(t))
            .collect(),
    )
}
