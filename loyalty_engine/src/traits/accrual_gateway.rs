use chrono::Duration;
use thiserror::Error;

use crate::traits::{AccrualApplied, AccrualUpdate, ClaimedBatch};

#[derive(Debug, Clone, Error)]
pub enum AccrualGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("Cannot credit the balance of user #{0}, since the user does not exist")]
    UserNotFound(i64),
}

impl From<sqlx::Error> for AccrualGatewayError {
    fn from(e: sqlx::Error) -> Self {
        AccrualGatewayError::DatabaseError(e.to_string())
    }
}

/// The storage capability required by the order accrual reconciliation pipeline.
///
/// Implementations must guarantee that
/// * concurrent calls to [`claim_pending_batch`](Self::claim_pending_batch), from this process or any other process
///   sharing the same database, never return the same order twice while a lease is live;
/// * [`apply_accrual`](Self::apply_accrual) is atomic: the order update and the balance credit either both happen, or
///   neither does.
#[allow(async_fn_in_trait)]
pub trait AccrualGatewayDatabase {
    /// The number of orders that are not yet in a terminal state.
    async fn count_pending_orders(&self) -> Result<u64, AccrualGatewayError>;

    /// Leases up to `limit` non-terminal orders that nobody else currently holds, oldest first.
    ///
    /// Orders held by another live lease are skipped rather than waited for. The lease lasts for `lease`, after which
    /// the orders become claimable again even if the batch was never released.
    async fn claim_pending_batch(&self, limit: usize, lease: Duration) -> Result<ClaimedBatch, AccrualGatewayError>;

    /// Gives up the lease on every order in the batch that still carries it. Returns the number of released orders.
    async fn release_batch(&self, batch: &ClaimedBatch) -> Result<u64, AccrualGatewayError>;

    /// Applies a status transition, and credits the owning user's balance for positive `PROCESSED` accruals, in one
    /// atomic unit of work.
    ///
    /// If the order is already in a terminal state, nothing is written and [`AccrualApplied::AlreadyFinal`] is
    /// returned.
    async fn apply_accrual(&self, update: &AccrualUpdate) -> Result<AccrualApplied, AccrualGatewayError>;
}
