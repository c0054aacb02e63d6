//! Victim Selection Heuristics
//!
//! Given a non-empty [`DeadlockSet`], pick the one thread whose reservation
//! is rolled back. Each heuristic is a pure function of the set and the
//! allocation matrix; none of them reads `request` or `available`.
//!
//! | # | Heuristic   | Score per thread            | Pick            |
//! |---|-------------|-----------------------------|-----------------|
//! | 1 | `max-total` | Σ allocation row            | strictly larger |
//! | 2 | `max-any`   | max of allocation row       | strictly larger |
//! | 3 | `min-total` | Σ allocation row            | strictly smaller|
//! | 4 | `min-any`   | min of allocation row       | strictly smaller|
//! | 5 | `linear`    | none                        | first member    |
//!
//! Max variants start from a bound of 0, min variants from "no bound".
//! Candidates are scanned in ascending index order, so ties go to the
//! lowest index. If no candidate beats the starting bound (an all-zero set
//! under a max variant) the lowest-index member is chosen.

use super::detector::DeadlockSet;
use super::resources::{Instances, ThreadId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Victim selection strategy, fixed for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Heuristic {
    /// Most instances held in total
    MaxTotal,
    /// Largest holding of any single resource type
    MaxAny,
    /// Fewest instances held in total
    MinTotal,
    /// Smallest holding of any single resource type
    MinAny,
    /// First thread of the deadlock set
    Linear,
}

impl Heuristic {
    /// Every heuristic, in selector-number order
    pub const ALL: [Heuristic; 5] = [
        Heuristic::MaxTotal,
        Heuristic::MaxAny,
        Heuristic::MinTotal,
        Heuristic::MinAny,
        Heuristic::Linear,
    ];

    /// Look up a heuristic by its 1-based selector number
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Heuristic::MaxTotal),
            2 => Some(Heuristic::MaxAny),
            3 => Some(Heuristic::MinTotal),
            4 => Some(Heuristic::MinAny),
            5 => Some(Heuristic::Linear),
            _ => None,
        }
    }

    /// 1-based selector number
    pub const fn index(self) -> u8 {
        match self {
            Heuristic::MaxTotal => 1,
            Heuristic::MaxAny => 2,
            Heuristic::MinTotal => 3,
            Heuristic::MinAny => 4,
            Heuristic::Linear => 5,
        }
    }

    /// Kebab-case name
    pub const fn name(self) -> &'static str {
        match self {
            Heuristic::MaxTotal => "max-total",
            Heuristic::MaxAny => "max-any",
            Heuristic::MinTotal => "min-total",
            Heuristic::MinAny => "min-any",
            Heuristic::Linear => "linear",
        }
    }

    /// Human-readable description of the rule
    pub const fn description(self) -> &'static str {
        match self {
            Heuristic::MaxTotal => "preempt the thread holding the most instances in total",
            Heuristic::MaxAny => "preempt the thread with the largest holding of any one type",
            Heuristic::MinTotal => "preempt the thread holding the fewest instances in total",
            Heuristic::MinAny => "preempt the thread with the smallest holding of any one type",
            Heuristic::Linear => "preempt deadlocked threads in index order",
        }
    }

    /// Choose the victim from `deadlocked`
    ///
    /// `allocation` is the full allocation matrix indexed by thread.
    /// Returns `None` only for an empty set.
    pub fn select(
        self,
        deadlocked: &DeadlockSet,
        allocation: &[Vec<Instances>],
    ) -> Option<ThreadId> {
        let fallback = deadlocked.first()?;

        let chosen = match self {
            Heuristic::MaxTotal => pick_max(deadlocked, |t| row_total(&allocation[t.as_usize()])),
            Heuristic::MaxAny => pick_max(deadlocked, |t| row_max(&allocation[t.as_usize()])),
            Heuristic::MinTotal => pick_min(deadlocked, |t| row_total(&allocation[t.as_usize()])),
            Heuristic::MinAny => pick_min(deadlocked, |t| row_min(&allocation[t.as_usize()])),
            Heuristic::Linear => None,
        };

        Some(chosen.unwrap_or(fallback))
    }
}

fn row_total(row: &[Instances]) -> u64 {
    row.iter().map(|&n| u64::from(n)).sum()
}

fn row_max(row: &[Instances]) -> u64 {
    row.iter().copied().max().map_or(0, u64::from)
}

fn row_min(row: &[Instances]) -> u64 {
    row.iter().copied().min().map_or(u64::MAX, u64::from)
}

/// First member whose score strictly exceeds every earlier best, starting at 0
fn pick_max(set: &DeadlockSet, score: impl Fn(ThreadId) -> u64) -> Option<ThreadId> {
    let mut best = 0;
    let mut chosen = None;
    for t in set.iter() {
        let s = score(t);
        if s > best {
            best = s;
            chosen = Some(t);
        }
    }
    chosen
}

/// First member whose score is strictly below every earlier best, starting unbounded
fn pick_min(set: &DeadlockSet, score: impl Fn(ThreadId) -> u64) -> Option<ThreadId> {
    let mut best: Option<u64> = None;
    let mut chosen = None;
    for t in set.iter() {
        let s = score(t);
        if best.map_or(true, |b| s < b) {
            best = Some(s);
            chosen = Some(t);
        }
    }
    chosen
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognised heuristic selector
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown heuristic '{0}' (expected 1-5, max-total, max-any, min-total, min-any or linear)")]
pub struct UnknownHeuristic(pub String);

impl FromStr for Heuristic {
    type Err = UnknownHeuristic;

    /// Accepts the selector number (`"1"`..`"5"`) or the kebab-case name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(index) = trimmed.parse::<u8>() {
            return Heuristic::from_index(index).ok_or_else(|| UnknownHeuristic(s.to_string()));
        }

        Heuristic::ALL
            .into_iter()
            .find(|h| h.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownHeuristic(s.to_string()))
    }
}
