//! Engine configuration settings and environment variable handling

use std::env;
use std::time::Duration;

// Ledger node
pub const DEFAULT_NODE_URL: &str = "https://fullnode.testnet.aptoslabs.com/v1";
pub const DEFAULT_TRANSFER_FUNCTION: &str = "0x1::aptos_account::transfer";

// Native asset
pub const NATIVE_ASSET: &str = "APT";
pub const NATIVE_DECIMALS: u32 = 8;

// Scheduler
pub const DEFAULT_SCHEDULER_INTERVAL_MS: u64 = 5_000;
pub const MIN_SCHEDULER_INTERVAL_MS: u64 = 100;

// Submission and finality
pub const DEFAULT_FINALITY_TIMEOUT_SECS: u64 = 30;
pub const MAX_FINALITY_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_FINALITY_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_MAX_GAS_AMOUNT: u64 = 2_000;
pub const DEFAULT_GAS_UNIT_PRICE: u64 = 100;
pub const DEFAULT_TX_EXPIRATION_SECS: u64 = 600;

// Trade pipeline
pub const DEFAULT_MAX_LEVERAGE: u32 = 150;

#[derive(Debug, Clone)]
pub struct Config {
    pub node_url: String,
    pub transfer_function: String,
    pub native_asset: String,
    pub native_decimals: u32,
    pub scheduler_interval_ms: u64,
    pub finality_timeout_secs: u64,
    pub finality_poll_interval_ms: u64,
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    pub tx_expiration_secs: u64,
    // Trade pipeline Configuration
    pub trade_module: Option<String>,
    pub max_leverage: u32,
    // Local output
    pub data_dir: String,
    pub log_dir: String,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            transfer_function: DEFAULT_TRANSFER_FUNCTION.to_string(),
            native_asset: NATIVE_ASSET.to_string(),
            native_decimals: NATIVE_DECIMALS,
            scheduler_interval_ms: DEFAULT_SCHEDULER_INTERVAL_MS,
            finality_timeout_secs: DEFAULT_FINALITY_TIMEOUT_SECS,
            finality_poll_interval_ms: DEFAULT_FINALITY_POLL_INTERVAL_MS,
            max_gas_amount: DEFAULT_MAX_GAS_AMOUNT,
            gas_unit_price: DEFAULT_GAS_UNIT_PRICE,
            tx_expiration_secs: DEFAULT_TX_EXPIRATION_SECS,
            trade_module: None,
            max_leverage: DEFAULT_MAX_LEVERAGE,
            data_dir: "output/data".to_string(),
            log_dir: "output/logs".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Self {
            node_url: env::var("LEDGER_NODE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.node_url),
            transfer_function: env::var("TRANSFER_FUNCTION")
                .unwrap_or(defaults.transfer_function),
            native_asset: defaults.native_asset,
            native_decimals: defaults.native_decimals,
            scheduler_interval_ms: env::var("SCHEDULER_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SCHEDULER_INTERVAL_MS)
                .max(MIN_SCHEDULER_INTERVAL_MS),
            finality_timeout_secs: env::var("FINALITY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FINALITY_TIMEOUT_SECS)
                .clamp(1, MAX_FINALITY_TIMEOUT_SECS),
            finality_poll_interval_ms: env::var("FINALITY_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FINALITY_POLL_INTERVAL_MS)
                .max(50),
            max_gas_amount: env::var("MAX_GAS_AMOUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_GAS_AMOUNT),
            gas_unit_price: env::var("GAS_UNIT_PRICE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_GAS_UNIT_PRICE),
            tx_expiration_secs: env::var("TX_EXPIRATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TX_EXPIRATION_SECS),
            trade_module: env::var("TRADE_MODULE").ok().filter(|s| !s.trim().is_empty()),
            max_leverage: env::var("MAX_LEVERAGE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_LEVERAGE)
                .max(1),
            data_dir: env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            log_dir: env::var("LOG_DIR").unwrap_or(defaults.log_dir),
            log_json: env::var("LOG_JSON")
                .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
                .unwrap_or(defaults.log_json),
        }
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler_interval_ms)
    }

    pub fn finality_timeout(&self) -> Duration {
        Duration::from_secs(self.finality_timeout_secs)
    }

    pub fn finality_poll_interval(&self) -> Duration {
        Duration::from_millis(self.finality_poll_interval_ms)
    }
}
