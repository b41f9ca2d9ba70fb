//! Timer loops, one per cycle kind.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use tflow_core::CycleKind;

use crate::scheduler::RefreshScheduler;

impl RefreshScheduler {
    /// Start all four cadences. Loops exit when `shutdown` becomes true.
    ///
    /// Each tick runs its cycle on a fresh task, so the timer keeps
    /// ticking while a slow cycle is in flight and the overlapping tick is
    /// skipped by the single-flight latch. The first tick fires at once.
    pub fn spawn(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        CycleKind::ALL
            .iter()
            .map(|kind| {
                tokio::spawn(run_cadence(Arc::clone(self), *kind, shutdown.clone()))
            })
            .collect()
    }
}

async fn run_cadence(
    scheduler: Arc<RefreshScheduler>,
    kind: CycleKind,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = scheduler.config.cadence(kind);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(cycle = %kind, period_secs = period.as_secs(), "Cadence started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move {
                    scheduler.run_cycle(kind).await;
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!(cycle = %kind, "Cadence stopped");
}
