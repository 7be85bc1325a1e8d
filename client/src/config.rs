//! Process configuration from the environment and an optional `.env` file.

use std::{env, time::Duration};

use solana_sdk::signature::Keypair;
use tracing::debug;

use crate::{error::ConfigError, wallet::parse_secret_key};

pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";
pub const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_HANDOFF_DELAY_SECS: u64 = 120;

pub const SECRET_KEY: &str = "SECRET_KEY";
pub const SECRET_KEY2: &str = "SECRET_KEY2";
pub const SECRET_KEY3: &str = "SECRET_KEY3";
pub const NONCE_ACCOUNT_KEY: &str = "NONCE_ACCOUNT_KEY";

/// Load `.env` from the working directory or its parents, if there is one.
/// Variables already set in the environment win.
pub fn load_dotenv() {
    match dotenv::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(err) => debug!("No .env loaded: {}", err),
    }
}

/// Keypair stored as a JSON byte array in `var`
pub fn keypair_from_env(var: &str) -> Result<Keypair, ConfigError> {
    let raw = env::var(var).map_err(|_| ConfigError::Missing(var.to_string()))?;
    parse_secret_key(var, &raw)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub rpc_url: String,
    /// How long to wait for a submitted transaction to confirm
    pub confirm_timeout: Duration,
    /// Pause between the first and second signature in the single-process
    /// hand-off flow
    pub handoff_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            confirm_timeout: Duration::from_secs(DEFAULT_CONFIRM_TIMEOUT_SECS),
            handoff_delay: Duration::from_secs(DEFAULT_HANDOFF_DELAY_SECS),
        }
    }
}
