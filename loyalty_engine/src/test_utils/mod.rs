//! Helpers for tests that need a real database or a stand-in accrual system.
pub mod prepare_env;
mod scripted_oracle;

pub use scripted_oracle::{ScriptedOracle, ScriptedOutcome};
