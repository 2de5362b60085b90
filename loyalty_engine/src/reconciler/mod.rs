//! # Order accrual reconciliation
//!
//! A reconciliation *pass* brings every pending order up to date with the accrual system:
//!
//! 1. Count the pending (`NEW` or `PROCESSING`) orders. If there are none, the pass is over.
//! 2. Queue one batch descriptor per `batch_size` pending orders on a bounded queue.
//! 3. A fixed pool of workers takes descriptors off the queue. For each one, a worker leases the next `batch_size`
//!    unclaimed pending orders and reconciles them one at a time, oldest first. Each order commits on its own.
//! 4. Once every worker has finished, the pass releases all the leases it took, so that orders left untouched (unknown
//!    to the accrual system, failed, or skipped after throttling) are picked up again by the next pass.
//!
//! A worker that is throttled by the accrual system stops taking batches for the rest of the pass. Cancellation is
//! observed between batches, between orders, and while waiting on the accrual system.
mod summary;
mod worker_pool;

use std::fmt::Display;

use chrono::Duration;
pub use summary::PassSummary;
use thiserror::Error;
pub use worker_pool::AccrualReconciler;

use crate::traits::AccrualGatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// The maximum number of orders claimed in one batch.
    pub batch_size: usize,
    /// The number of batches processed concurrently.
    pub pool_size: usize,
    /// How long a claimed batch stays reserved for its worker if it is never released.
    pub claim_lease: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { batch_size: 10, pool_size: 3, claim_lease: Duration::minutes(5) }
    }
}

impl Display for ReconcilerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batch size: {}, workers: {}, claim lease: {}s",
            self.batch_size,
            self.pool_size,
            self.claim_lease.num_seconds()
        )
    }
}

/// A pass was abandoned because the database could not be queried. Nothing was lost; the next pass starts over.
#[derive(Debug, Clone, Error)]
pub enum PassError {
    #[error("Reconciliation pass abandoned. Database error: {0}")]
    Database(String),
}

impl From<AccrualGatewayError> for PassError {
    fn from(e: AccrualGatewayError) -> Self {
        Self::Database(e.to_string())
    }
}
