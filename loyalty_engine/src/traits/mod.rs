//! #  Database management and control.
//!
//! This module provides the interfaces that define the interface contracts of the loyalty engine database *backends*.
//! Each aggregate gets its own narrow capability trait, so that an API only asks for what it actually uses.
//!
//! ## Traits
//! * [`OrderManagement`] stores uploaded orders and answers queries about them.
//! * [`AccountManagement`] manages user accounts, their balances and the withdrawal ledger.
//! * [`AccrualGatewayDatabase`] is the capability the reconciliation pipeline needs: counting pending orders, claiming
//!   disjoint batches of them, and atomically applying an accrual outcome (order status + balance credit).
mod account_management;
mod accrual_gateway;
mod order_management;

mod data_objects;

pub use account_management::{AccountApiError, AccountManagement};
pub use accrual_gateway::{AccrualGatewayDatabase, AccrualGatewayError};
pub use data_objects::{AccrualApplied, AccrualUpdate, ClaimToken, ClaimedBatch, InsertOrderResult};
pub use order_management::{OrderManagement, OrderManagementError};
