use std::{env, time::Duration};

use log::*;
use loyalty_engine::ReconcilerConfig;
use lpg_common::helpers::{parse_boolean_flag, parse_positive};

const DEFAULT_LPG_DATABASE_URL: &str = "sqlite://data/loyalty_store.db";
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 10;
const DEFAULT_ACCRUAL_SYSTEM_ADDRESS: &str = "http://localhost:8081";
const DEFAULT_ACCRUAL_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_WORKER_POOL_SIZE: usize = 3;
const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(300);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub max_db_connections: u32,
    /// The base address of the accrual system, e.g. "http://localhost:8081".
    pub accrual_system_address: String,
    /// Every call to the accrual system is abandoned after this long.
    pub accrual_timeout: Duration,
    /// The time between the starts of two reconciliation passes.
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub worker_pool_size: usize,
    /// How long a batch claimed by a worker stays reserved if the process dies before releasing it.
    pub claim_lease: Duration,
    /// If true, the embedded database migrations are run on startup.
    pub run_migrations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_LPG_DATABASE_URL.to_string(),
            max_db_connections: DEFAULT_MAX_DB_CONNECTIONS,
            accrual_system_address: DEFAULT_ACCRUAL_SYSTEM_ADDRESS.to_string(),
            accrual_timeout: DEFAULT_ACCRUAL_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            claim_lease: DEFAULT_CLAIM_LEASE,
            run_migrations: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("LPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ LPG_DATABASE_URL is not set. Using the default, {DEFAULT_LPG_DATABASE_URL}.");
            DEFAULT_LPG_DATABASE_URL.to_string()
        });
        let max_db_connections = positive_from_env("LPG_MAX_DB_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS);
        let accrual_system_address = env::var("LPG_ACCRUAL_SYSTEM_ADDRESS").ok().unwrap_or_else(|| {
            warn!("🪛️ LPG_ACCRUAL_SYSTEM_ADDRESS is not set. Using the default, {DEFAULT_ACCRUAL_SYSTEM_ADDRESS}.");
            DEFAULT_ACCRUAL_SYSTEM_ADDRESS.to_string()
        });
        let accrual_timeout = seconds_from_env("LPG_ACCRUAL_TIMEOUT_SECS", DEFAULT_ACCRUAL_TIMEOUT);
        let poll_interval = seconds_from_env("LPG_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL);
        let batch_size = positive_from_env("LPG_BATCH_SIZE", DEFAULT_BATCH_SIZE);
        let worker_pool_size = positive_from_env("LPG_WORKER_POOL_SIZE", DEFAULT_WORKER_POOL_SIZE);
        let claim_lease = seconds_from_env("LPG_CLAIM_LEASE_SECS", DEFAULT_CLAIM_LEASE);
        let run_migrations = parse_boolean_flag(env::var("LPG_RUN_MIGRATIONS").ok(), true);
        warn_if_lease_too_short(claim_lease, accrual_timeout, batch_size);
        Self {
            database_url,
            max_db_connections,
            accrual_system_address,
            accrual_timeout,
            poll_interval,
            batch_size,
            worker_pool_size,
            claim_lease,
            run_migrations,
        }
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        let claim_lease = chrono::Duration::from_std(self.claim_lease).unwrap_or_else(|_| {
            warn!("🪛️ The claim lease is out of range. Using the default of {}s.", DEFAULT_CLAIM_LEASE.as_secs());
            chrono::Duration::seconds(DEFAULT_CLAIM_LEASE.as_secs() as i64)
        });
        ReconcilerConfig { batch_size: self.batch_size, pool_size: self.worker_pool_size, claim_lease }
    }
}

/// A worker may spend up to one accrual timeout per order in its batch. Leases shorter than that let another worker
/// claim the same orders while they are still being reconciled.
fn warn_if_lease_too_short(claim_lease: Duration, accrual_timeout: Duration, batch_size: usize) -> bool {
    let worst_case = u32::try_from(batch_size).ok().and_then(|n| accrual_timeout.checked_mul(n));
    let too_short = match worst_case {
        Some(worst_case) => claim_lease <= worst_case,
        None => true,
    };
    if too_short {
        let worst_case = worst_case.map(|d| format!("{}s", d.as_secs())).unwrap_or_else(|| "too long to count".into());
        warn!(
            "🪛️ The claim lease ({}s) is shorter than the time a worker may need for a full batch ({worst_case}). \
             Orders may be reconciled by more than one worker.",
            claim_lease.as_secs()
        );
    }
    too_short
}

fn positive_from_env<T>(name: &str, default: T) -> T
where T: std::str::FromStr + PartialOrd + Default + std::fmt::Display {
    match env::var(name) {
        Ok(s) => parse_positive::<T>(&s).unwrap_or_else(|| {
            warn!("🪛️ {s} is not a valid value for {name}. Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

fn seconds_from_env(name: &str, default: Duration) -> Duration {
    let secs = positive_from_env::<u64>(name, default.as_secs());
    Duration::from_secs(secs)
}
