//! # Accrual system client
//!
//! The accrual system is the external service that decides how many points an order earns. This module wraps its
//! HTTP API behind the [`AccrualOracle`] trait, translating every possible response into one of four outcomes:
//! * `Ok(Some(response))`: the accrual system knows the order, and reports its status (and accrual, if awarded).
//! * `Ok(None)`: the order is not registered with the accrual system (yet).
//! * `Err(e)` with [`AccrualClientError::is_throttling`]: the accrual system is rate limiting us. Back off.
//! * Any other `Err(e)`: a transient failure for this order only.
mod client;
mod errors;
mod objects;

pub use client::{normalise_base_url, AccrualClient};
pub use errors::AccrualClientError;
pub use objects::{AccrualResponse, AccrualStatus};

use crate::db_types::OrderNumber;

/// A source of truth for order accruals.
#[allow(async_fn_in_trait)]
pub trait AccrualOracle {
    /// Asks for the accrual state of the given order. `Ok(None)` means the order is unknown to the oracle.
    async fn fetch_accrual(&self, number: &OrderNumber) -> Result<Option<AccrualResponse>, AccrualClientError>;
}

impl<T: AccrualOracle> AccrualOracle for &T {
    async fn fetch_accrual(&self, number: &OrderNumber) -> Result<Option<AccrualResponse>, AccrualClientError> {
        (**self).fetch_accrual(number).await
    }
}
