use std::time::Duration;

use log::*;
use loyalty_engine::{
    AccrualClient,
    AccrualGatewayDatabase,
    AccrualOracle,
    AccrualReconciler,
    ReconcilerConfig,
    SqliteDatabase,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Starts the accrual worker. The worker runs until `cancel` is triggered; await the returned JoinHandle after that to
/// let the pass in progress wind down.
pub fn start_accrual_worker(
    db: SqliteDatabase,
    client: AccrualClient,
    config: ReconcilerConfig,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let reconciler = AccrualReconciler::new(db, client, config);
    tokio::spawn(run_accrual_poller(reconciler, poll_interval, cancel))
}

/// Runs a reconciliation pass on every tick of the poll interval. Passes never overlap: a pass that overruns the
/// interval delays the next tick.
///
/// If the accrual system asks for a back-off longer than the interval, the next pass waits until it has elapsed.
pub async fn run_accrual_poller<B, O>(reconciler: AccrualReconciler<B, O>, interval: Duration, cancel: CancellationToken)
where
    B: AccrualGatewayDatabase,
    O: AccrualOracle,
{
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("🕰️ Accrual worker started. Polling every {}ms. {}", interval.as_millis(), reconciler.config());
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {},
        }
        trace!("🕰️ Running accrual reconciliation pass");
        match reconciler.run_pass(&cancel).await {
            Ok(summary) if summary.pending == 0 => trace!("🕰️ No pending orders"),
            Ok(summary) => {
                info!("🕰️ Accrual reconciliation pass complete. {summary}");
                if let Some(wait) = summary.retry_after.filter(|w| *w > interval) {
                    warn!("🕰️ The accrual system asked us to back off. Next pass in {}s", wait.as_secs());
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(wait - interval) => timer.reset(),
                    }
                }
            },
            Err(e) => error!("🕰️ Accrual reconciliation pass failed. Retrying on the next tick. {e}"),
        }
    }
    info!("🕰️ Accrual worker stopped");
}
