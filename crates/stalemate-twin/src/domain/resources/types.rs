//! Core Types for Resource Accounting

use serde::{Deserialize, Serialize};
use std::fmt;

/// Worker thread identifier (row index into every per-thread matrix)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub usize);

impl ThreadId {
    /// Create a new thread identifier
    #[inline(always)]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Resource type identifier (column index into every per-thread matrix)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub usize);

impl ResourceId {
    /// Create a new resource identifier
    #[inline(always)]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the underlying usize value
    #[inline(always)]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Instance count of a resource type
pub type Instances = u32;

/// A countable kind of shared instance with a fixed maximum count
///
/// The name is informational only; identity is the [`ResourceId`] index
/// the type occupies in the state matrices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    /// Display name (e.g. "printer")
    pub name: String,
    /// Total instances in the system, fixed at startup
    pub max_instances: Instances,
}

impl ResourceType {
    /// Create a new resource type
    pub fn new(name: impl Into<String>, max_instances: Instances) -> Self {
        Self {
            name: name.into(),
            max_instances,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.max_instances)
    }
}

/// Outcome of one atomic grant step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// Instances moved from the pool into the thread's allocation
    pub quantity: Instances,
    /// `true` once the thread's remaining request for this type reached zero
    pub satisfied: bool,
}

/// Instances handed back to the pool for one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Returned {
    /// Resource type the instances belong to
    pub resource: ResourceId,
    /// Number of instances returned
    pub quantity: Instances,
}

/// Errors raised when building a state from explicit matrices
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// A matrix row has the wrong number of columns
    #[error("Row {row} of {matrix} has {actual} columns, expected {expected}")]
    DimensionMismatch {
        /// Matrix name ("allocation" or "request")
        matrix: &'static str,
        /// Offending row
        row: usize,
        /// Column count found
        actual: usize,
        /// Column count expected (resource type count)
        expected: usize,
    },

    /// The two matrices disagree on the number of threads
    #[error("Allocation has {allocation} rows but request has {request}")]
    ThreadCountMismatch {
        /// Rows in the allocation matrix
        allocation: usize,
        /// Rows in the request matrix
        request: usize,
    },

    /// Allocated instances of a type exceed its capacity
    #[error("Resource {resource} over-allocated: {allocated} held but only {max_instances} exist")]
    OverAllocated {
        /// Resource type
        resource: ResourceId,
        /// Sum of the allocation column
        allocated: u64,
        /// Capacity of the type
        max_instances: Instances,
    },
}

/// Conservation law violation (`available + Σ allocation != max`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Conservation violated for {resource}: {available} + {allocated} != {max_instances}")]
pub struct ConservationViolation {
    /// Resource type whose column does not balance
    pub resource: ResourceId,
    /// Instances in the pool
    pub available: Instances,
    /// Sum of the allocation column
    pub allocated: u64,
    /// Capacity of the type
    pub max_instances: Instances,
}
