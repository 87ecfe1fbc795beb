//! Periodic driver: one stabilization interval and one lagging reflection
//! interval on a single task.

use tokio::sync::watch;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::reflector::{DispatchStats, ResourceController};
use crate::supervisor::{now_ts, FlagSupervisor};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub reflections: u64,
    pub transitions: u64,
    /// Ticks that hit the pass cap.
    pub unconverged: u64,
    pub dispatch: DispatchStats,
}

/// Run until `shutdown` turns `true` or its sender is dropped.
///
/// Ticks are stamped with a monotonic clock anchored to the wall clock at
/// startup, so delays keep their length across wall-clock jumps.
/// The reflect interval starts one period late so it always trails a tick.
pub async fn run<C: ResourceController + ?Sized>(
    sup: &FlagSupervisor,
    controller: &mut C,
    mut shutdown: watch::Receiver<bool>,
) -> RunStats {
    let mut stats = RunStats::default();
    let anchor_ts = now_ts();
    let anchor = Instant::now();

    let mut stabilize = interval(sup.cfg().stabilize_period());
    stabilize.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let reflect_period = sup.cfg().reflect_period();
    let mut reflect = interval_at(anchor + reflect_period, reflect_period);
    reflect.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        stabilize_ms = sup.cfg().stabilize_interval_ms,
        reflect_ms = sup.cfg().reflect_interval_ms,
        "flag runtime started"
    );

    while !*shutdown.borrow() {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    warn!("shutdown sender dropped; stopping");
                    break;
                }
            }
            _ = stabilize.tick() => {
                let now = anchor_ts + anchor.elapsed().as_secs_f64();
                let report = sup.tick_at(now);
                stats.ticks += 1;
                stats.transitions += report.changes.len() as u64;
                if !report.converged {
                    stats.unconverged += 1;
                }
            }
            _ = reflect.tick() => {
                stats.dispatch += sup.reflect(controller);
                stats.reflections += 1;
            }
        }
    }

    info!(
        ticks = stats.ticks,
        transitions = stats.transitions,
        sent = stats.dispatch.sent,
        failed = stats.dispatch.failed,
        "flag runtime stopped"
    );
    stats
}
