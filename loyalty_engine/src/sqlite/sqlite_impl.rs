//! `SqliteDatabase` is a concrete implementation of a loyalty engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`traits`] module.
//!
//! [`traits`]: crate::traits
use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use lpg_common::Points;
use sqlx::SqlitePool;

use super::db::{new_pool, orders, user_accounts};
use crate::{
    db_types::{NewOrder, Order, OrderNumber, UserAccount, UserBalance, Withdrawal},
    traits::{
        AccountApiError,
        AccountManagement,
        AccrualApplied,
        AccrualGatewayDatabase,
        AccrualGatewayError,
        AccrualUpdate,
        ClaimToken,
        ClaimedBatch,
        InsertOrderResult,
        OrderManagement,
        OrderManagementError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        let (order, inserted) = orders::idempotent_insert(order, &mut conn).await?;
        if inserted {
            Ok(InsertOrderResult::Inserted(order))
        } else {
            Ok(InsertOrderResult::AlreadyExists(order))
        }
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, OrderManagementError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(orders)
    }
}

impl AccountManagement for SqliteDatabase {
    async fn create_user(&self, login: &str) -> Result<UserAccount, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::create_user(login, &mut conn).await
    }

    async fn fetch_user_account(&self, user_id: i64) -> Result<Option<UserAccount>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::user_account_by_id(user_id, &mut conn).await
    }

    async fn fetch_user_account_by_login(&self, login: &str) -> Result<Option<UserAccount>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::user_account_by_login(login, &mut conn).await
    }

    async fn fetch_balance(&self, user_id: i64) -> Result<Option<UserBalance>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::fetch_balance(user_id, &mut conn).await
    }

    async fn fetch_withdrawals(&self, user_id: i64) -> Result<Vec<Withdrawal>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        user_accounts::fetch_withdrawals(user_id, &mut conn).await
    }

    async fn credit_balance(&self, user_id: i64, amount: Points) -> Result<(), AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        if user_accounts::credit_balance(user_id, amount, &mut conn).await? {
            Ok(())
        } else {
            Err(AccountApiError::UserNotFound(user_id))
        }
    }
}

impl AccrualGatewayDatabase for SqliteDatabase {
    async fn count_pending_orders(&self) -> Result<u64, AccrualGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let count = orders::count_pending_orders(&mut conn).await?;
        Ok(count)
    }

    async fn claim_pending_batch(&self, limit: usize, lease: Duration) -> Result<ClaimedBatch, AccrualGatewayError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let token = ClaimToken::random();
        let expires_at = Utc::now() + lease;
        let mut conn = self.pool.acquire().await?;
        let orders = orders::claim_pending_orders(limit, &token, expires_at, &mut conn).await?;
        Ok(ClaimedBatch::new(token, orders))
    }

    async fn release_batch(&self, batch: &ClaimedBatch) -> Result<u64, AccrualGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let released = orders::release_claim(&batch.token, &mut conn).await?;
        trace!("🗃️ Released {released} orders from claim {}", batch.token);
        Ok(released)
    }

    /// Runs the order update and the balance credit in a single transaction.
    ///
    /// The status guard on the order update is what keeps a credit from ever being applied twice: once an order is
    /// `PROCESSED`, no later update will match it, and no credit is issued.
    async fn apply_accrual(&self, update: &AccrualUpdate) -> Result<AccrualApplied, AccrualGatewayError> {
        let mut tx = self.pool.begin().await?;
        let updated = orders::update_pending_order(update.order_id, update.status, update.accrual, &mut tx).await?;
        if !updated {
            debug!("🗃️ Order {} is already final. Leaving it alone", update.number);
            tx.rollback().await?;
            return Ok(AccrualApplied::AlreadyFinal);
        }
        let credited = update.credit();
        if credited.is_positive() {
            if !user_accounts::credit_balance(update.user_id, credited, &mut tx).await? {
                error!("🗃️ Order {} belongs to user #{}, who does not exist", update.number, update.user_id);
                tx.rollback().await?;
                return Err(AccrualGatewayError::UserNotFound(update.user_id));
            }
            debug!("🗃️ Credited {credited} to user #{} for order {}", update.user_id, update.number);
        }
        tx.commit().await?;
        Ok(AccrualApplied::Updated { credited })
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
