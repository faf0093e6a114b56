use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::reconcile::{EventLister, EventStore, Updater};

/// Run a reconciliation pass every `interval` until `cancel` fires.
///
/// The first pass runs immediately. A failed pass is logged (and counted by
/// the updater); the loop carries on with the next tick.
pub async fn run_updates<S, T>(
    updater: &Updater,
    source: &S,
    target: &T,
    interval: Duration,
    cancel: CancellationToken,
) where
    S: EventLister + ?Sized,
    T: EventStore + ?Sized,
{
    let mut ticker = tokio::time::interval(interval);
    // A slow pass should not be followed by a burst of catch-up passes.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = updater.update(source, target) => {
                if let Err(e) = res {
                    tracing::error!(target: "scheduler", error = %format!("{e:#}"), "update failed, retrying next tick");
                }
            }
        }
    }
    tracing::info!(target: "scheduler", "update loop stopped");
}
