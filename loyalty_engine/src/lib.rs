//! Loyalty Engine
//!
//! The loyalty engine turns the orders users upload into loyalty points. An external accrual system decides how many
//! points each order earns; this library keeps the local order book and user balances in step with it.
//!
//! The library is divided into these main sections:
//! 1. Database management and control ([`mod@traits`] and [`mod@sqlite`]). The traits describe narrow capabilities per
//!    aggregate (orders, accounts, and the accrual reconciliation gateway). SQLite is the supported backend. The data
//!    types used in the database are defined in the [`mod@db_types`] module and are public.
//! 2. The accrual system client ([`mod@accrual`]), which translates HTTP responses into domain outcomes.
//! 3. The loyalty engine public API ([`mod@lpe_api`]): order intake, accounts, and the per-order accrual state machine.
//! 4. The reconciler ([`mod@reconciler`]), which runs passes over all pending orders with a bounded pool of concurrent
//!    workers.
pub mod accrual;
pub mod db_types;
pub mod helpers;
mod lpe_api;
pub mod reconciler;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(test)]
mod pipeline_tests;

pub use accrual::{AccrualClient, AccrualClientError, AccrualOracle};
pub use lpe_api::{
    accounts_api::AccountApi,
    accrual_flow_api::{map_accrual_status, plan_accrual_update, AccrualFlowApi, OrderOutcome},
    errors::{OrderIntakeError, ReconcileError},
    order_intake_api::OrderIntakeApi,
};
pub use reconciler::{AccrualReconciler, PassError, PassSummary, ReconcilerConfig};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{AccountManagement, AccrualGatewayDatabase, OrderManagement};
