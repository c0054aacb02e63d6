//! Tracing Observer - SimEvent to Log Line
//!
//! | Event                             | Level   |
//! |-----------------------------------|---------|
//! | need, grant, block, release       | `debug` |
//! | restart, detection started        | `trace` |
//! | no deadlock, deadlock, resolved   | `info`  |
//! | victim preempted                  | `warn`  |
//!
//! The library never installs a subscriber. Without one these calls cost
//! a level check.

use crate::domain::{SimEvent, SimulationObserver};
use tracing::{debug, info, trace, warn};

/// Forwards every [`SimEvent`] to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SimulationObserver for TracingObserver {
    fn on_event(&self, event: &SimEvent) {
        match event {
            SimEvent::NeedGenerated { thread, need } => {
                debug!(%thread, ?need, "🎲 New need generated");
            }
            SimEvent::Granted {
                thread,
                resource,
                quantity,
            } => {
                debug!(%thread, %resource, quantity, "✅ Granted");
            }
            SimEvent::Blocked {
                thread,
                resource,
                requested,
                available,
            } => {
                debug!(%thread, %resource, requested, available, "⏳ Blocked waiting for instances");
            }
            SimEvent::Released {
                thread,
                resource,
                quantity,
            } => {
                debug!(%thread, %resource, quantity, "🔓 Released");
            }
            SimEvent::Restarted { thread } => {
                trace!(%thread, "🔄 Restarting thread");
            }
            SimEvent::DetectionStarted => {
                trace!("🔍 Checking for deadlock");
            }
            SimEvent::NoDeadlock => {
                info!("🟢 No deadlock");
            }
            SimEvent::DeadlockDetected { threads } => {
                info!(size = threads.len(), "🔴 Deadlock detected among threads [{}]", threads);
            }
            SimEvent::VictimPreempted {
                victim,
                heuristic,
                released,
            } => {
                let instances: u64 = released.iter().map(|r| u64::from(r.quantity)).sum();
                warn!(%victim, %heuristic, instances, "⚠️  Preempting victim");
            }
            SimEvent::DeadlockResolved {
                preemptions,
                total_deadlocks,
            } => {
                info!(preemptions, total_deadlocks, "🛠️  Deadlock resolved");
            }
        }
    }
}
