use std::env;

const HELP: &str = include_str!("./cli-help.txt");

const CONFIG_VARS: [&str; 10] = [
    "RUST_LOG",
    "LPG_DATABASE_URL",
    "LPG_MAX_DB_CONNECTIONS",
    "LPG_ACCRUAL_SYSTEM_ADDRESS",
    "LPG_ACCRUAL_TIMEOUT_SECS",
    "LPG_POLL_INTERVAL_SECS",
    "LPG_BATCH_SIZE",
    "LPG_WORKER_POOL_SIZE",
    "LPG_CLAIM_LEASE_SECS",
    "LPG_RUN_MIGRATIONS",
];

/// The server has no command line interface. Any argument at all prints the help text and the configuration
/// currently visible in the environment. Returns true if that happened, and the process should exit.
pub fn handle_command_line_args() -> bool {
    if env::args().len() <= 1 {
        return false;
    }
    println!("\n{HELP}\n");
    println!("{}", current_configuration());
    true
}

fn current_configuration() -> String {
    let mut out = String::from("Current environment values:\n");
    for name in CONFIG_VARS {
        let value = match env::var_os(name) {
            Some(v) => v.to_string_lossy().into_owned(),
            None => "Not set".to_string(),
        };
        out.push_str(&format!("  {name:<30} {value}\n"));
    }
    out
}
