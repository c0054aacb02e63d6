//! ResourceState - The Shared Allocation Matrices
//!
//! # Layout
//!
//! ```text
//! ResourceState
//!   ├─ resources:   [ResourceType; R]          (name, max_instances)
//!   ├─ available:   [Instances; R]             (pool)
//!   ├─ allocation:  [[Instances; R]; T]        (held)
//!   ├─ request:     [[Instances; R]; T]        (still needed this cycle)
//!   └─ cur_request: [[Instances; R]; T]        (in-flight ask)
//! ```
//!
//! # Conservation Law
//!
//! For every resource type `r`:
//!
//! ```text
//! available[r] + Σ_t allocation[t][r] == max_instances[r]
//! ```
//!
//! Every mutating method moves instances between `available` and one
//! `allocation` cell in a single step, so the law holds whenever the state
//! is observed through the monitor lock.
//!
//! This type holds no lock itself. It is owned by
//! [`ResourceMonitor`](crate::infrastructure::ResourceMonitor) and only
//! reachable through its guard.

use super::types::{
    ConservationViolation, Grant, Instances, ResourceId, ResourceType, Returned, StateError,
    ThreadId,
};
use serde::{Deserialize, Serialize};

/// Shared per-thread / per-resource-type accounting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    resources: Vec<ResourceType>,
    available: Vec<Instances>,
    allocation: Vec<Vec<Instances>>,
    request: Vec<Vec<Instances>>,
    cur_request: Vec<Vec<Instances>>,
}

impl ResourceState {
    /// Allocate a zeroed state for `num_threads` workers
    ///
    /// Every pool starts full (`available[r] = max_instances[r]`) and every
    /// per-thread row starts at zero.
    pub fn new(resources: Vec<ResourceType>, num_threads: usize) -> Self {
        let width = resources.len();
        let available = resources.iter().map(|r| r.max_instances).collect();

        Self {
            resources,
            available,
            allocation: vec![vec![0; width]; num_threads],
            request: vec![vec![0; width]; num_threads],
            cur_request: vec![vec![0; width]; num_threads],
        }
    }

    /// Build a state from explicit allocation and request matrices
    ///
    /// `available` is derived from capacity minus the allocation column
    /// sums, so the result always satisfies the conservation law.
    ///
    /// # Errors
    ///
    /// - `ThreadCountMismatch`: matrices have different row counts
    /// - `DimensionMismatch`: a row is not `resources.len()` wide
    /// - `OverAllocated`: a column sums past its capacity
    pub fn from_parts(
        resources: Vec<ResourceType>,
        allocation: Vec<Vec<Instances>>,
        request: Vec<Vec<Instances>>,
    ) -> Result<Self, StateError> {
        if allocation.len() != request.len() {
            return Err(StateError::ThreadCountMismatch {
                allocation: allocation.len(),
                request: request.len(),
            });
        }

        let width = resources.len();
        for (matrix, rows) in [("allocation", &allocation), ("request", &request)] {
            if let Some((row, cols)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
                return Err(StateError::DimensionMismatch {
                    matrix,
                    row,
                    actual: cols.len(),
                    expected: width,
                });
            }
        }

        let mut available = Vec::with_capacity(width);
        for (r, ty) in resources.iter().enumerate() {
            let allocated: u64 = allocation.iter().map(|row| u64::from(row[r])).sum();
            if allocated > u64::from(ty.max_instances) {
                return Err(StateError::OverAllocated {
                    resource: ResourceId(r),
                    allocated,
                    max_instances: ty.max_instances,
                });
            }
            // allocated <= max_instances, fits in Instances
            available.push(ty.max_instances - allocated as Instances);
        }

        let cur_request = vec![vec![0; width]; allocation.len()];

        Ok(Self {
            resources,
            available,
            allocation,
            request,
            cur_request,
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Queries
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Number of worker threads (T)
    #[inline(always)]
    pub fn num_threads(&self) -> usize {
        self.allocation.len()
    }

    /// Number of resource types (R)
    #[inline(always)]
    pub fn num_resources(&self) -> usize {
        self.resources.len()
    }

    /// Resource type descriptors
    pub fn resources(&self) -> &[ResourceType] {
        &self.resources
    }

    /// Capacity of one resource type
    #[inline(always)]
    pub fn max_instances(&self, resource: ResourceId) -> Instances {
        self.resources[resource.as_usize()].max_instances
    }

    /// The available pool
    pub fn available(&self) -> &[Instances] {
        &self.available
    }

    /// The full allocation matrix, one row per thread
    pub fn allocation(&self) -> &[Vec<Instances>] {
        &self.allocation
    }

    /// The full remaining-request matrix, one row per thread
    pub fn request(&self) -> &[Vec<Instances>] {
        &self.request
    }

    /// One thread's allocation row
    pub fn allocation_row(&self, thread: ThreadId) -> &[Instances] {
        &self.allocation[thread.as_usize()]
    }

    /// One thread's remaining-request row
    pub fn request_row(&self, thread: ThreadId) -> &[Instances] {
        &self.request[thread.as_usize()]
    }

    /// Instances `thread` still needs of `resource` this cycle
    #[inline(always)]
    pub fn remaining(&self, thread: ThreadId, resource: ResourceId) -> Instances {
        self.request[thread.as_usize()][resource.as_usize()]
    }

    /// The in-flight ask of `thread` for `resource`
    #[inline(always)]
    pub fn current_request(&self, thread: ThreadId, resource: ResourceId) -> Instances {
        self.cur_request[thread.as_usize()][resource.as_usize()]
    }

    /// `true` when the thread holds no instance of any type
    pub fn holds_nothing(&self, thread: ThreadId) -> bool {
        self.allocation_row(thread).iter().all(|&n| n == 0)
    }

    /// Sum of all instances held by `thread`
    pub fn total_allocation(&self, thread: ThreadId) -> u64 {
        self.allocation_row(thread).iter().map(|&n| u64::from(n)).sum()
    }

    /// Check the conservation law for every resource type
    ///
    /// # Errors
    ///
    /// Returns the first resource type whose column does not balance.
    pub fn check_conservation(&self) -> Result<(), ConservationViolation> {
        for (r, ty) in self.resources.iter().enumerate() {
            let allocated: u64 = self.allocation.iter().map(|row| u64::from(row[r])).sum();
            let available = self.available[r];
            if u64::from(available) + allocated != u64::from(ty.max_instances) {
                return Err(ConservationViolation {
                    resource: ResourceId(r),
                    available,
                    allocated,
                    max_instances: ty.max_instances,
                });
            }
        }
        Ok(())
    }

    /// Copy every matrix into a serialisable snapshot
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            resources: self.resources.clone(),
            available: self.available.clone(),
            allocation: self.allocation.clone(),
            request: self.request.clone(),
            cur_request: self.cur_request.clone(),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Allocation protocol steps
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Record the need drawn for `resource` at the start of a cycle
    ///
    /// The need is clamped to the type's capacity so a thread can never
    /// wait for more instances than exist.
    pub fn set_need(&mut self, thread: ThreadId, resource: ResourceId, need: Instances) {
        let need = need.min(self.max_instances(resource));
        self.request[thread.as_usize()][resource.as_usize()] = need;
    }

    /// Place an in-flight ask, clamped to the outstanding request
    ///
    /// Returns the amount actually recorded.
    pub fn begin_request(
        &mut self,
        thread: ThreadId,
        resource: ResourceId,
        amount: Instances,
    ) -> Instances {
        let (t, r) = (thread.as_usize(), resource.as_usize());
        let amount = amount.min(self.request[t][r]);
        self.cur_request[t][r] = amount;
        amount
    }

    /// `true` when the in-flight ask fits in the pool
    ///
    /// This is the predicate a blocked worker re-checks after every wake.
    #[inline(always)]
    pub fn can_grant(&self, thread: ThreadId, resource: ResourceId) -> bool {
        let (t, r) = (thread.as_usize(), resource.as_usize());
        self.cur_request[t][r] <= self.available[r]
    }

    /// Move the in-flight ask from the pool into the thread's allocation
    ///
    /// Callers must have observed [`can_grant`](Self::can_grant) under the
    /// same lock acquisition. A preempted thread has its ask zeroed, so the
    /// grant completes at quantity zero and reports the type satisfied.
    pub fn grant(&mut self, thread: ThreadId, resource: ResourceId) -> Grant {
        let (t, r) = (thread.as_usize(), resource.as_usize());
        debug_assert!(self.can_grant(thread, resource));

        let quantity = self.cur_request[t][r].min(self.available[r]);
        self.available[r] -= quantity;
        self.allocation[t][r] += quantity;
        self.request[t][r] = self.request[t][r].saturating_sub(quantity);
        self.cur_request[t][r] = 0;

        Grant {
            quantity,
            satisfied: self.request[t][r] == 0,
        }
    }

    /// Return every held instance of `thread` to the pool
    ///
    /// Used at the end of a need-cycle. Only non-zero returns are reported.
    pub fn release_all(&mut self, thread: ThreadId) -> Vec<Returned> {
        let t = thread.as_usize();
        let mut returned = Vec::new();

        for r in 0..self.num_resources() {
            let held = std::mem::take(&mut self.allocation[t][r]);
            self.available[r] += held;
            if held != 0 {
                returned.push(Returned {
                    resource: ResourceId(r),
                    quantity: held,
                });
            }
        }

        returned
    }

    /// Roll back the victim's reservation
    ///
    /// Returns its allocation to the pool and zeroes its allocation,
    /// request, and in-flight rows. Preempting a thread that holds and
    /// needs nothing leaves the pool untouched.
    pub fn preempt(&mut self, victim: ThreadId) -> Vec<Returned> {
        let returned = self.release_all(victim);
        let t = victim.as_usize();
        self.request[t].fill(0);
        self.cur_request[t].fill(0);
        returned
    }
}

/// Serialisable copy of a [`ResourceState`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Resource type descriptors
    pub resources: Vec<ResourceType>,
    /// Available pool
    pub available: Vec<Instances>,
    /// Allocation matrix
    pub allocation: Vec<Vec<Instances>>,
    /// Remaining-request matrix
    pub request: Vec<Vec<Instances>>,
    /// In-flight request matrix
    pub cur_request: Vec<Vec<Instances>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_types() -> Vec<ResourceType> {
        vec![ResourceType::new("disk", 3), ResourceType::new("tape", 2)]
    }

    #[test]
    fn test_new_state_is_full_and_zeroed() {
        let state = ResourceState::new(two_types(), 4);

        assert_eq!(state.num_threads(), 4);
        assert_eq!(state.num_resources(), 2);
        assert_eq!(state.available(), &[3, 2]);
        for t in 0..4 {
            assert!(state.holds_nothing(ThreadId(t)));
            assert_eq!(state.request_row(ThreadId(t)), &[0, 0]);
        }
        assert!(state.check_conservation().is_ok());
    }

    #[test]
    fn test_grant_moves_instances() {
        let mut state = ResourceState::new(two_types(), 2);
        let (t, r) = (ThreadId(0), ResourceId(0));

        state.set_need(t, r, 3);
        assert_eq!(state.begin_request(t, r, 2), 2);
        assert!(state.can_grant(t, r));

        let grant = state.grant(t, r);
        assert_eq!(grant, Grant { quantity: 2, satisfied: false });
        assert_eq!(state.available()[0], 1);
        assert_eq!(state.allocation_row(t), &[2, 0]);
        assert_eq!(state.remaining(t, r), 1);
        assert_eq!(state.current_request(t, r), 0);
        assert!(state.check_conservation().is_ok());
    }

    #[test]
    fn test_grant_zero_need_is_satisfied() {
        let mut state = ResourceState::new(two_types(), 1);
        let (t, r) = (ThreadId(0), ResourceId(1));

        state.begin_request(t, r, 0);
        let grant = state.grant(t, r);
        assert_eq!(grant, Grant { quantity: 0, satisfied: true });
    }

    #[test]
    fn test_request_is_clamped_to_outstanding_need() {
        let mut state = ResourceState::new(two_types(), 1);
        let (t, r) = (ThreadId(0), ResourceId(0));

        state.set_need(t, r, 10);
        assert_eq!(state.remaining(t, r), 3);
        assert_eq!(state.begin_request(t, r, 10), 3);
    }

    #[test]
    fn test_cannot_grant_beyond_pool() {
        let mut state = ResourceState::from_parts(
            two_types(),
            vec![vec![2, 0], vec![0, 0]],
            vec![vec![0, 0], vec![3, 0]],
        )
        .unwrap();
        let (t, r) = (ThreadId(1), ResourceId(0));

        state.begin_request(t, r, 2);
        assert!(!state.can_grant(t, r));
    }

    #[test]
    fn test_release_all_reports_non_zero() {
        let mut state = ResourceState::from_parts(
            two_types(),
            vec![vec![2, 0], vec![1, 2]],
            vec![vec![0, 0], vec![0, 0]],
        )
        .unwrap();

        let returned = state.release_all(ThreadId(0));
        assert_eq!(returned, vec![Returned { resource: ResourceId(0), quantity: 2 }]);
        assert_eq!(state.available(), &[2, 0]);
        assert!(state.holds_nothing(ThreadId(0)));
        assert!(state.check_conservation().is_ok());
    }

    #[test]
    fn test_preempt_zeroes_all_rows() {
        let mut state = ResourceState::from_parts(
            two_types(),
            vec![vec![1, 1], vec![1, 1]],
            vec![vec![2, 1], vec![0, 1]],
        )
        .unwrap();
        state.begin_request(ThreadId(0), ResourceId(0), 1);

        let returned = state.preempt(ThreadId(0));

        assert_eq!(returned.len(), 2);
        assert_eq!(state.available(), &[2, 1]);
        assert!(state.holds_nothing(ThreadId(0)));
        assert_eq!(state.request_row(ThreadId(0)), &[0, 0]);
        assert_eq!(state.current_request(ThreadId(0), ResourceId(0)), 0);
        assert!(state.check_conservation().is_ok());
    }

    #[test]
    fn test_preempt_idle_thread_is_noop_on_pool() {
        let mut state = ResourceState::from_parts(
            two_types(),
            vec![vec![0, 0], vec![3, 1]],
            vec![vec![0, 0], vec![0, 1]],
        )
        .unwrap();
        let before = state.available().to_vec();

        assert!(state.preempt(ThreadId(0)).is_empty());
        assert_eq!(state.available(), before.as_slice());
    }

    #[test]
    fn test_from_parts_rejects_over_allocation() {
        let err = ResourceState::from_parts(
            two_types(),
            vec![vec![2, 0], vec![2, 0]],
            vec![vec![0, 0], vec![0, 0]],
        )
        .unwrap_err();

        assert!(matches!(err, StateError::OverAllocated { resource: ResourceId(0), .. }));
    }

    #[test]
    fn test_from_parts_rejects_ragged_rows() {
        let err = ResourceState::from_parts(
            two_types(),
            vec![vec![0, 0], vec![0]],
            vec![vec![0, 0], vec![0, 0]],
        )
        .unwrap_err();

        assert!(matches!(err, StateError::DimensionMismatch { matrix: "allocation", row: 1, .. }));
    }

    #[test]
    fn test_snapshot_matches_state() {
        let state = ResourceState::new(two_types(), 2);
        let snap = state.snapshot();
        assert_eq!(snap.available, vec![3, 2]);
        assert_eq!(snap.allocation.len(), 2);
    }
}
