//! # Loyalty engine public API
//!
//! The `lpe_api` module exposes the programmatic API for the loyalty engine.
//!
//! * [`order_intake_api`] validates and stores the orders users upload, and answers queries about them.
//! * [`accounts_api`] provides access to user accounts, balances and the withdrawal ledger.
//! * [`accrual_flow_api`] drives a single order through its status state machine, based on what the accrual system
//!   reports about it.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use loyalty_engine::{AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements AccountManagement
//! let api = AccountApi::new(db);
//! let balance = api.balance(user_id).await?;
//! ```
pub mod accounts_api;
pub mod accrual_flow_api;
pub mod errors;
pub mod order_intake_api;
