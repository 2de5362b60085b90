use std::{fmt::Debug, sync::Arc};

use futures_util::future::join_all;
use log::*;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::{
    accrual::AccrualOracle,
    db_types::Order,
    lpe_api::{
        accrual_flow_api::{AccrualFlowApi, OrderOutcome},
        errors::ReconcileError,
    },
    reconciler::{PassError, PassSummary, ReconcilerConfig},
    traits::{AccrualGatewayDatabase, ClaimedBatch},
};

type BatchQueue = Arc<Mutex<mpsc::Receiver<u64>>>;

/// What one worker did during a pass. The leases it took are handed back to the pass, which releases them once every
/// worker is done.
#[derive(Default)]
struct WorkerReport {
    summary: PassSummary,
    batches: Vec<ClaimedBatch>,
    fatal: Option<PassError>,
}

/// Runs reconciliation passes with a fixed-size pool of concurrent workers.
///
/// The reconciler holds no state between passes. All progress lives in the database.
pub struct AccrualReconciler<B, O> {
    api: AccrualFlowApi<B, O>,
    config: ReconcilerConfig,
}

impl<B, O> Debug for AccrualReconciler<B, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccrualReconciler ({})", self.config)
    }
}

impl<B, O> AccrualReconciler<B, O> {
    pub fn new(db: B, oracle: O, config: ReconcilerConfig) -> Self {
        Self { api: AccrualFlowApi::new(db, oracle), config }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

impl<B, O> AccrualReconciler<B, O>
where
    B: AccrualGatewayDatabase,
    O: AccrualOracle,
{
    /// Runs a single reconciliation pass, and returns once every worker has finished and every lease has been released.
    ///
    /// Per-order failures and throttling are reported in the summary. Only a failure to query the pending work is an
    /// error.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<PassSummary, PassError> {
        let mut summary = PassSummary::default();
        if cancel.is_cancelled() {
            summary.cancelled = true;
            return Ok(summary);
        }
        let pending = self.api.db().count_pending_orders().await?;
        summary.pending = pending;
        if pending == 0 {
            debug!("🔄️ No pending orders to reconcile");
            return Ok(summary);
        }
        let batch_size = self.config.batch_size.max(1);
        let pool_size = self.config.pool_size.max(1);
        let batches = pending.div_ceil(batch_size as u64);
        info!("🔄️ Reconciling {pending} pending orders in up to {batches} batches with {pool_size} workers");

        let (sender, receiver) = mpsc::channel::<u64>(pool_size);
        let queue: BatchQueue = Arc::new(Mutex::new(receiver));
        let producer = async move {
            for seq in 0..batches {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = sender.send(seq) => {
                        // Every worker has stopped. Nobody is left to take the rest.
                        if sent.is_err() {
                            break;
                        }
                    },
                }
            }
        };
        let workers = (0..pool_size).map(|id| self.worker(id, Arc::clone(&queue), cancel)).collect::<Vec<_>>();
        drop(queue);
        let ((), reports) = tokio::join!(producer, join_all(workers));

        let mut fatal = None;
        for report in reports {
            summary.merge(report.summary);
            for batch in &report.batches {
                if let Err(e) = self.api.db().release_batch(batch).await {
                    warn!("🔄️ Could not release claim {}. It will lapse on its own. {e}", batch.token);
                }
            }
            fatal = fatal.or(report.fatal);
        }
        match fatal {
            Some(e) => {
                error!("🔄️ {e}");
                Err(e)
            },
            None => Ok(summary),
        }
    }

    async fn worker(&self, id: usize, queue: BatchQueue, cancel: &CancellationToken) -> WorkerReport {
        let mut report = WorkerReport::default();
        loop {
            if cancel.is_cancelled() {
                report.summary.cancelled = true;
                break;
            }
            let next = queue.lock().await.recv().await;
            let Some(seq) = next else {
                break;
            };
            let limit = self.config.batch_size.max(1);
            let batch = match self.api.db().claim_pending_batch(limit, self.config.claim_lease).await {
                Ok(batch) => batch,
                Err(e) => {
                    report.fatal = Some(e.into());
                    break;
                },
            };
            if batch.is_empty() {
                trace!("🔄️ Worker {id} found nothing left to claim");
                break;
            }
            debug!("🔄️ Worker {id} claimed {} orders as batch {seq} ({})", batch.len(), batch.token);
            report.summary.claimed += batch.len();
            let keep_going = self.process_batch(id, &batch.orders, cancel, &mut report.summary).await;
            report.batches.push(batch);
            if !keep_going {
                break;
            }
        }
        trace!("🔄️ Worker {id} done");
        report
    }

    /// Reconciles the orders in claim order. Returns `false` if the worker should stop taking batches.
    async fn process_batch(
        &self,
        id: usize,
        orders: &[Order],
        cancel: &CancellationToken,
        summary: &mut PassSummary,
    ) -> bool {
        for order in orders {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.cancelled = true;
                    return false;
                },
                result = self.api.reconcile_order(order) => result,
            };
            match result {
                Ok(OrderOutcome::Updated { credited, .. }) => {
                    summary.updated += 1;
                    summary.credited += credited;
                },
                Ok(OrderOutcome::Unchanged) | Ok(OrderOutcome::AlreadyFinal) => summary.unchanged += 1,
                Ok(OrderOutcome::Unregistered) => summary.unregistered += 1,
                Err(ReconcileError::Throttled { retry_after }) => {
                    warn!("🔄️ Worker {id} is being throttled at order {}. Backing off for this pass", order.number);
                    summary.record_throttle(retry_after);
                    return false;
                },
                Err(e) => {
                    error!("🔄️ Worker {id} could not reconcile order {}. {e}", order.number);
                    summary.failed += 1;
                },
            }
        }
        true
    }
}
