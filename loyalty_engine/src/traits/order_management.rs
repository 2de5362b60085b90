use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderNumber},
    traits::InsertOrderResult,
};

#[derive(Debug, Clone, Error)]
pub enum OrderManagementError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The user #{0} does not exist")]
    UserNotFound(i64),
}

impl From<sqlx::Error> for OrderManagementError {
    fn from(e: sqlx::Error) -> Self {
        OrderManagementError::DatabaseError(e.to_string())
    }
}

/// The `OrderManagement` trait defines the behaviour for storing and querying orders in the database backend.
///
/// Orders are only ever created here. Status changes belong to the reconciliation pipeline, see
/// [`crate::traits::AccrualGatewayDatabase`].
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order in status `NEW` with a zero accrual. This call is idempotent: if an order with the same
    /// number already exists, it is returned untouched as [`InsertOrderResult::AlreadyExists`].
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, OrderManagementError>;

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderManagementError>;

    /// All the orders uploaded by the given user, newest first.
    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderManagementError>;
}
