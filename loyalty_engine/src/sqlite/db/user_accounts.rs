use log::{debug, trace};
use lpg_common::Points;
use sqlx::SqliteConnection;

use crate::{
    db_types::{UserAccount, UserBalance, Withdrawal},
    traits::AccountApiError,
};

/// Creates a user with a zero balance. The `RETURNING` row is drained with `fetch_all` so that the insert commits before
/// the connection goes back to the pool.
pub async fn create_user(login: &str, conn: &mut SqliteConnection) -> Result<UserAccount, AccountApiError> {
    let mut rows: Vec<UserAccount> = sqlx::query_as("INSERT INTO users (login) VALUES ($1) RETURNING *")
        .bind(login)
        .fetch_all(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref de) if de.is_unique_violation() => AccountApiError::LoginTaken(login.to_string()),
            e => e.into(),
        })?;
    let account = rows.pop().ok_or_else(|| AccountApiError::DatabaseError(format!("User '{login}' was not created")))?;
    debug!("🧑️ Created user account for '{login}'");
    Ok(account)
}

pub async fn user_account_by_id(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAccount>, AccountApiError> {
    let account = sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn user_account_by_login(
    login: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAccount>, AccountApiError> {
    let account = sqlx::query_as("SELECT * FROM users WHERE login = $1").bind(login).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn fetch_balance(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<UserBalance>, AccountApiError> {
    let row: Option<(Points, Points)> = sqlx::query_as(
        r#"
        SELECT
            users.balance,
            COALESCE((SELECT SUM(amount) FROM withdrawals WHERE withdrawals.user_id = users.id), 0)
        FROM users WHERE users.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(current, withdrawn)| UserBalance { current, withdrawn }))
}

/// The withdrawals made by the user, newest first.
pub async fn fetch_withdrawals(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Withdrawal>, AccountApiError> {
    let withdrawals =
        sqlx::query_as("SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY processed_at DESC, id DESC")
            .bind(user_id)
            .fetch_all(conn)
            .await?;
    Ok(withdrawals)
}

/// Adds `amount` to the user's balance. This is not atomic on its own. Pass `&mut *tx` as the connection to make the
/// credit part of a wider unit of work.
///
/// Returns `false` if the user does not exist.
pub async fn credit_balance(user_id: i64, amount: Points, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users SET
            balance = balance + $1,
            updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
        WHERE id = $2
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .execute(conn)
    .await?;
    trace!("🧑️ Credited {amount} to user #{user_id}");
    Ok(result.rows_affected() == 1)
}
