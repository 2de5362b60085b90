use chrono::{DateTime, Utc};
use log::{debug, trace};
use lpg_common::Points;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderNumber, OrderStatusType},
    traits::{ClaimToken, OrderManagementError},
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), OrderManagementError> {
    let inserted = match fetch_order_by_number(&order.number, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("📝️ Order [{}] inserted with id {}", order.number, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// New orders always start out in status `NEW` with a zero accrual.
///
/// The `RETURNING` rows are always drained. A statement left half-stepped keeps its implicit transaction open, and the
/// new row stays invisible to every other connection in the pool.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderManagementError> {
    let mut rows: Vec<Order> = sqlx::query_as(
        r#"
            INSERT INTO orders (user_id, number) VALUES ($1, $2)
            RETURNING *;
        "#,
    )
    .bind(order.user_id)
    .bind(order.number.as_str())
    .fetch_all(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref de) if de.is_foreign_key_violation() => {
            OrderManagementError::UserNotFound(order.user_id)
        },
        e => e.into(),
    })?;
    rows.pop().ok_or_else(|| OrderManagementError::DatabaseError(format!("Order {} was not inserted", order.number)))
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE number = $1").bind(number.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Resulting orders are ordered by `created_at` in descending order (newest first).
pub async fn fetch_orders_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

pub async fn count_pending_orders(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let counts: Vec<i64> = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status IN ('NEW', 'PROCESSING')")
        .fetch_all(conn)
        .await?;
    let count = counts.first().copied().unwrap_or_default();
    Ok(u64::try_from(count).unwrap_or_default())
}

/// Stamps up to `limit` unclaimed (or expired-claim) pending orders with the given claim token, and returns them.
///
/// The selection and the stamp happen in a single statement, so two concurrent claims can never pick up the same
/// order. SQLite serialises writers, and the second claim only sees the orders the first one left behind.
///
/// The returned orders are in no particular order.
pub async fn claim_pending_orders(
    limit: i64,
    token: &ClaimToken,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let now = Utc::now().timestamp_millis();
    let orders: Vec<Order> = sqlx::query_as(
        r#"
        UPDATE orders SET claim_token = $1, claim_expires_at = $2
        WHERE id IN (
            SELECT id FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
            AND (claim_expires_at IS NULL OR claim_expires_at < $3)
            ORDER BY created_at, id
            LIMIT $4
        )
        RETURNING *;
        "#,
    )
    .bind(token.as_str())
    .bind(expires_at.timestamp_millis())
    .bind(now)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    trace!("📝️ Claim {token} took {} orders", orders.len());
    Ok(orders)
}

/// Clears the claim on every order that still carries the given token.
pub async fn release_claim(token: &ClaimToken, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE orders SET claim_token = NULL, claim_expires_at = NULL WHERE claim_token = $1")
            .bind(token.as_str())
            .execute(conn)
            .await?;
    Ok(result.rows_affected())
}

/// Sets the status and accrual of an order, as long as the order is not in a terminal state yet.
///
/// Returns `false` if the order is missing, or if it has already reached `INVALID` or `PROCESSED`. In that case nothing
/// is modified.
pub async fn update_pending_order(
    id: i64,
    status: OrderStatusType,
    accrual: Points,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = $1,
            accrual = $2,
            updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
        WHERE id = $3 AND status IN ('NEW', 'PROCESSING')
        "#,
    )
    .bind(status)
    .bind(accrual)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
