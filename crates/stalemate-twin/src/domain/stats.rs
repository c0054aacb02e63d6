//! Deadlock Statistics & Run Report

use super::resources::StateSnapshot;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Running counters kept by the detector
///
/// One deadlock *episode* is a detector tick whose first pass found a
/// non-empty set, however many preemption rounds it then took. The time
/// between episodes is measured from the previous episode, or from the
/// simulation start for the first one.
#[derive(Debug, Clone)]
pub struct DeadlockStats {
    episodes: u64,
    preemptions: u64,
    ticks: u64,
    time_between: Duration,
    last_mark: Instant,
}

impl DeadlockStats {
    /// Start counting from `start`
    pub fn new(start: Instant) -> Self {
        Self {
            episodes: 0,
            preemptions: 0,
            ticks: 0,
            time_between: Duration::ZERO,
            last_mark: start,
        }
    }

    /// Count one detector tick
    pub fn record_tick(&mut self) {
        self.ticks += 1;
    }

    /// Count an episode observed at `now`
    ///
    /// Returns the interval since the previous mark.
    pub fn record_episode(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last_mark);
        self.episodes += 1;
        self.time_between += elapsed;
        self.last_mark = now;
        elapsed
    }

    /// Count preemption rounds performed for an episode
    pub fn record_preemptions(&mut self, rounds: usize) {
        self.preemptions += rounds as u64;
    }

    /// Deadlock episodes so far
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Preemption rounds so far
    pub fn preemptions(&self) -> u64 {
        self.preemptions
    }

    /// Detector ticks so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Cumulative time between episodes
    pub fn total_time_between(&self) -> Duration {
        self.time_between
    }

    /// Mean time between episodes, `None` before the first one
    pub fn average_time_between(&self) -> Option<Duration> {
        u32::try_from(self.episodes)
            .ok()
            .filter(|&n| n > 0)
            .map(|n| self.time_between / n)
    }
}

/// Summary returned when a simulation stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Deadlock episodes detected
    pub total_deadlocks: u64,
    /// Preemption rounds performed
    pub total_preemptions: u64,
    /// Detector ticks executed
    pub detector_ticks: u64,
    /// Need-cycles completed by all workers
    pub cycles_completed: u64,
    /// Cumulative seconds between deadlock episodes
    pub total_secs_between_deadlocks: f64,
    /// Mean seconds between deadlock episodes
    pub average_secs_between_deadlocks: Option<f64>,
    /// Wall-clock run time in seconds
    pub elapsed_secs: f64,
    /// State at shutdown
    pub final_state: StateSnapshot,
}

impl SimulationReport {
    /// Assemble a report from the detector's counters
    pub fn new(
        stats: &DeadlockStats,
        cycles_completed: u64,
        elapsed: Duration,
        final_state: StateSnapshot,
    ) -> Self {
        Self {
            total_deadlocks: stats.episodes(),
            total_preemptions: stats.preemptions(),
            detector_ticks: stats.ticks(),
            cycles_completed,
            total_secs_between_deadlocks: stats.total_time_between().as_secs_f64(),
            average_secs_between_deadlocks: stats.average_time_between().map(|d| d.as_secs_f64()),
            elapsed_secs: elapsed.as_secs_f64(),
            final_state,
        }
    }
}
