use std::fmt::Debug;

use log::*;
use lpg_common::Points;

use crate::{
    accrual::{AccrualClientError, AccrualOracle, AccrualResponse, AccrualStatus},
    db_types::{Order, OrderStatusType},
    lpe_api::errors::ReconcileError,
    traits::{AccrualApplied, AccrualGatewayDatabase, AccrualUpdate},
};

/// What happened to a single order during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    /// The accrual system does not know about the order yet. It stays as it is until the next pass.
    Unregistered,
    /// The accrual system had nothing new to say about the order.
    Unchanged,
    /// The new status was committed, and the owner credited with `credited` points.
    Updated { status: OrderStatusType, credited: Points },
    /// The order reached a terminal state elsewhere before this update could be applied.
    AlreadyFinal,
}

/// `AccrualFlowApi` moves a single order through its state machine, based on what the accrual system reports.
///
/// ```text
///   NEW ──> PROCESSING ──> PROCESSED
///    │           └───────> INVALID
///    ├───────────────────> PROCESSED
///    └───────────────────> INVALID
/// ```
/// `PROCESSED` and `INVALID` are terminal.
pub struct AccrualFlowApi<B, O> {
    db: B,
    oracle: O,
}

impl<B, O> Debug for AccrualFlowApi<B, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccrualFlowApi")
    }
}

impl<B, O> AccrualFlowApi<B, O> {
    pub fn new(db: B, oracle: O) -> Self {
        Self { db, oracle }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, O> AccrualFlowApi<B, O>
where
    B: AccrualGatewayDatabase,
    O: AccrualOracle,
{
    /// Asks the accrual system about the order, and commits whatever transition it reports.
    ///
    /// The status change and the balance credit (for `PROCESSED` orders with a positive accrual) are committed
    /// together, or not at all. Errors only concern this order. A [`ReconcileError::Throttled`] error means the caller
    /// should stop calling the accrual system for a while.
    pub async fn reconcile_order(&self, order: &Order) -> Result<OrderOutcome, ReconcileError> {
        let response = match self.oracle.fetch_accrual(&order.number).await? {
            Some(response) => response,
            None => {
                debug!("🔄️📦️ Order {} is not registered with the accrual system yet", order.number);
                return Ok(OrderOutcome::Unregistered);
            },
        };
        let Some(update) = plan_accrual_update(order, &response)? else {
            trace!("🔄️📦️ Order {} is still {}. Nothing to do", order.number, order.status);
            return Ok(OrderOutcome::Unchanged);
        };
        match self.db.apply_accrual(&update).await? {
            AccrualApplied::Updated { credited } => {
                info!(
                    "🔄️📦️ Order {} moved from {} to {} with an accrual of {}",
                    order.number, order.status, update.status, update.accrual
                );
                Ok(OrderOutcome::Updated { status: update.status, credited })
            },
            AccrualApplied::AlreadyFinal => {
                debug!("🔄️📦️ Order {} was finalised elsewhere. Skipping", order.number);
                Ok(OrderOutcome::AlreadyFinal)
            },
        }
    }
}

/// The order status that corresponds to a status reported by the accrual system. The two sets of states are the same;
/// anything else is an error for the order that carries it.
pub fn map_accrual_status(status: &AccrualStatus) -> Result<OrderStatusType, ReconcileError> {
    match status {
        AccrualStatus::New => Ok(OrderStatusType::New),
        AccrualStatus::Processing => Ok(OrderStatusType::Processing),
        AccrualStatus::Invalid => Ok(OrderStatusType::Invalid),
        AccrualStatus::Processed => Ok(OrderStatusType::Processed),
        AccrualStatus::Other(s) => Err(ReconcileError::UnknownAccrualStatus(s.clone())),
    }
}

/// Decides which transition, if any, an accrual system report calls for.
///
/// A report about any order other than `order` is malformed, and is an error.
///
/// Returns `Ok(None)` when nothing needs to be written:
/// * the order is already terminal,
/// * the reported status is the one the order already has,
/// * the report would move the order backwards (`PROCESSING` back to `NEW`).
///
/// An accrual is only ever recorded for `PROCESSED` orders, converted exactly into minor units.
pub fn plan_accrual_update(order: &Order, response: &AccrualResponse) -> Result<Option<AccrualUpdate>, ReconcileError> {
    if response.order != order.number.as_str() {
        warn!(
            "🔄️📦️ Asked the accrual system about order {} but it answered for order #{}",
            order.number, response.order
        );
        return Err(ReconcileError::Oracle(AccrualClientError::MalformedResponse(format!(
            "expected a report for order {}, got one for order #{}",
            order.number, response.order
        ))));
    }
    if order.status.is_terminal() {
        return Ok(None);
    }
    let status = map_accrual_status(&response.status)?;
    let accrual = match (&response.accrual, status) {
        (Some(amount), OrderStatusType::Processed) => Points::from_major_units(amount)
            .map_err(|e| ReconcileError::InvalidAccrual(format!("order {}: {e}", order.number)))?,
        (Some(amount), status) => {
            warn!("🔄️📦️ Ignoring an accrual of {amount} reported for order {} in status {status}", order.number);
            Points::zero()
        },
        (None, _) => Points::zero(),
    };
    if status == order.status {
        return Ok(None);
    }
    if order.status == OrderStatusType::Processing && status == OrderStatusType::New {
        debug!("🔄️📦️ Accrual system reports order {} as NEW, but it is already PROCESSING", order.number);
        return Ok(None);
    }
    Ok(Some(AccrualUpdate { order_id: order.id, user_id: order.user_id, number: order.number.clone(), status, accrual }))
}
