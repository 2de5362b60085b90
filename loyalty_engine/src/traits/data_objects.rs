use std::fmt::Display;

use lpg_common::Points;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderNumber, OrderStatusType};

#[derive(Debug, Clone)]
pub enum InsertOrderResult {
    Inserted(Order),
    AlreadyExists(Order),
}

//--------------------------------------      ClaimToken       -------------------------------------------------------
/// An opaque, random marker stamped on every row of a claimed batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimToken(String);

impl ClaimToken {
    pub fn random() -> Self {
        Self(format!("{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClaimToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------     ClaimedBatch      -------------------------------------------------------
/// A set of pending orders leased to a single worker.
///
/// No other claim will return these orders until the batch is released via
/// [`crate::traits::AccrualGatewayDatabase::release_batch`], or until the lease expires.
#[derive(Debug, Clone)]
pub struct ClaimedBatch {
    pub token: ClaimToken,
    /// The claimed orders, in ascending creation order.
    pub orders: Vec<Order>,
}

impl ClaimedBatch {
    pub fn new(token: ClaimToken, mut orders: Vec<Order>) -> Self {
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Self { token, orders }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }
}

//--------------------------------------     AccrualUpdate     -------------------------------------------------------
/// A state transition for a single order, as decided by the status mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualUpdate {
    pub order_id: i64,
    pub user_id: i64,
    pub number: OrderNumber,
    pub status: OrderStatusType,
    pub accrual: Points,
}

impl AccrualUpdate {
    /// The amount the owning user's balance must be credited with when this update is applied.
    pub fn credit(&self) -> Points {
        if self.status == OrderStatusType::Processed && self.accrual.is_positive() {
            self.accrual
        } else {
            Points::zero()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccrualApplied {
    /// The order was updated, and the owner's balance credited with the given amount (possibly zero).
    Updated { credited: Points },
    /// The order had already reached a terminal state. Nothing was written.
    AlreadyFinal,
}
