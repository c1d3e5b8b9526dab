use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::refresher::Refresher;

/// Spawns the periodic sweep-then-refresh trigger.
///
/// Returns `None` when no (or a zero) schedule is configured; no periodic
/// task is registered at all in that case and the engine stays inert except
/// for on-demand registration.
///
/// Within one tick the sweep fully completes before refresh dispatch begins,
/// so a key pruned in this tick is never refreshed in the same tick. The
/// replay units themselves run asynchronously on the worker pool; the tick
/// never waits for them.
pub fn spawn_scheduler(
    refresher: Arc<Refresher>,
    schedule: Option<Duration>,
    runtime: &tokio::runtime::Handle,
) -> Option<JoinHandle<()>> {
    let period = schedule.filter(|period| !period.is_zero())?;

    Some(runtime.spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; skip it so a
        // fresh start does not replay before anything was registered.
        interval.tick().await;

        loop {
            interval.tick().await;

            if let Err(err) = refresher.clean_refresh_value().await {
                tracing::error!(error = %err, "Stale-entry sweep failed");
            }
            if let Err(err) = refresher.refresh().await {
                tracing::error!(error = %err, "Refresh dispatch failed");
            }
        }
    }))
}
