use lpg_common::Points;
use thiserror::Error;

use crate::db_types::{UserAccount, UserBalance, Withdrawal};

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The login '{0}' is already taken")]
    LoginTaken(String),
    #[error("The user #{0} does not exist")]
    UserNotFound(i64),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}

/// The `AccountManagement` trait defines behaviour for managing user accounts, their spendable balance and the
/// withdrawal ledger.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// Creates a new user with a zero balance.
    async fn create_user(&self, login: &str) -> Result<UserAccount, AccountApiError>;

    /// Fetches the user account associated with the given id. If no account exists, `None` is returned.
    async fn fetch_user_account(&self, user_id: i64) -> Result<Option<UserAccount>, AccountApiError>;

    async fn fetch_user_account_by_login(&self, login: &str) -> Result<Option<UserAccount>, AccountApiError>;

    /// The current balance of the user, along with the sum of all withdrawals they have made.
    async fn fetch_balance(&self, user_id: i64) -> Result<Option<UserBalance>, AccountApiError>;

    /// The withdrawal ledger for the user, newest first.
    async fn fetch_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, AccountApiError>;

    /// Adds `amount` to the user's balance outside of any wider transaction.
    async fn credit_balance(&self, user_id: i64, amount: Points) -> Result<(), AccountApiError>;
}
