//! # Loyalty points server
//! This crate hosts the long-running loyalty points service. It is responsible for:
//! * Opening (and migrating) the order and balance store.
//! * Polling the accrual system for every pending order, crediting users for the points their orders earn.
//! * Shutting down cleanly on Ctrl-C or SIGTERM, letting the reconciliation pass in progress wind down first.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.

pub mod accrual_worker;
pub mod cli;
pub mod config;
pub mod errors;
pub mod server;
