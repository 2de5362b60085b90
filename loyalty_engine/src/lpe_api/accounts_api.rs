//! Unifies API for accessing accounts.

use std::fmt::Debug;

use log::{debug, trace};
use lpg_common::Points;

use crate::{
    db_types::{UserAccount, UserBalance, Withdrawal},
    traits::{AccountApiError, AccountManagement},
};

/// The `AccountApi` provides a unified API for accessing user accounts and their balances.
pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, login: &str) -> Result<UserAccount, AccountApiError> {
        let account = self.db.create_user(login).await?;
        debug!("🧑️ New user #{} ({login}) created", account.id);
        Ok(account)
    }

    /// Fetches the user account for the given id. If no account exists, `None` is returned.
    pub async fn account_by_id(&self, user_id: i64) -> Result<Option<UserAccount>, AccountApiError> {
        self.db.fetch_user_account(user_id).await
    }

    pub async fn account_by_login(&self, login: &str) -> Result<Option<UserAccount>, AccountApiError> {
        self.db.fetch_user_account_by_login(login).await
    }

    /// The user's spendable balance, and the sum of everything they have withdrawn so far.
    pub async fn balance(&self, user_id: i64) -> Result<UserBalance, AccountApiError> {
        self.db.fetch_balance(user_id).await?.ok_or(AccountApiError::UserNotFound(user_id))
    }

    /// The user's withdrawal history, newest first.
    pub async fn withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, AccountApiError> {
        self.db.fetch_withdrawals(user_id).await
    }

    /// Manually credits a user's balance. Accrual credits do not go through here; they are applied together with the
    /// order status change that earned them.
    pub async fn credit_balance(&self, user_id: i64, amount: Points) -> Result<(), AccountApiError> {
        trace!("🧑️ Crediting {amount} to user #{user_id}");
        self.db.credit_balance(user_id, amount).await
    }
}
