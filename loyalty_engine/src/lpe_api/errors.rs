use std::time::Duration;

use thiserror::Error;

use crate::{
    accrual::AccrualClientError,
    db_types::Order,
    traits::{AccrualGatewayError, OrderManagementError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderIntakeError {
    #[error("'{0}' is not a valid order number")]
    InvalidOrderNumber(String),
    #[error("Order {} has already been uploaded by this user", .0.number)]
    AlreadyUploaded(Box<Order>),
    #[error("Order has already been uploaded by another user")]
    UploadedByAnotherUser,
    #[error("The user #{0} does not exist")]
    UnknownUser(i64),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<OrderManagementError> for OrderIntakeError {
    fn from(e: OrderManagementError) -> Self {
        match e {
            OrderManagementError::UserNotFound(id) => OrderIntakeError::UnknownUser(id),
            e => OrderIntakeError::DatabaseError(e.to_string()),
        }
    }
}

/// Everything that can stop a single order from being reconciled.
///
/// Only [`ReconcileError::Throttled`] has consequences beyond the order itself: the worker that sees it stops
/// calling the accrual system for the rest of the pass.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("The accrual system is throttling requests. Retry after: {retry_after:?}")]
    Throttled { retry_after: Option<Duration> },
    #[error("Accrual system error: {0}")]
    Oracle(AccrualClientError),
    #[error("The accrual system reported an unknown order status: {0}")]
    UnknownAccrualStatus(String),
    #[error("The accrual system reported an unusable accrual: {0}")]
    InvalidAccrual(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<AccrualClientError> for ReconcileError {
    fn from(e: AccrualClientError) -> Self {
        match e {
            AccrualClientError::TooManyRequests { retry_after } => Self::Throttled { retry_after },
            e => Self::Oracle(e),
        }
    }
}

impl From<AccrualGatewayError> for ReconcileError {
    fn from(e: AccrualGatewayError) -> Self {
        Self::Database(e.to_string())
    }
}
