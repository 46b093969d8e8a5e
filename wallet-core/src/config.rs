//! Configuration for the wallet ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Wallet ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Seconds to wait for a wallet row lock before aborting
    pub lock_timeout_secs: u64,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Idempotency cache configuration
    pub idempotency: IdempotencyConfig,

    /// Admission control configuration
    pub admission: AdmissionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/wallets"),
            service_name: "wallet-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            lock_timeout_secs: 5,
            rocksdb: RocksDBConfig::default(),
            idempotency: IdempotencyConfig::default(),
            admission: AdmissionConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,       // 64 MB
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            enable_statistics: false,
        }
    }
}

/// Idempotency cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    /// Entry time-to-live (seconds)
    pub ttl_secs: u64,

    /// Background sweep interval (seconds)
    pub sweep_interval_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,            // 24 hours
            sweep_interval_secs: 3_600,  // hourly sweep
        }
    }
}

/// Admission control configuration
///
/// Fixed-window limits per caller key, one limit per operation class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Window length (seconds)
    pub window_secs: u64,

    /// Max lookup requests per window
    pub lookup_limit: u32,

    /// Max fund requests per window
    pub fund_limit: u32,

    /// Max transfer requests per window
    pub transfer_limit: u32,

    /// Stale-window cleanup interval (seconds)
    pub cleanup_interval_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            lookup_limit: 100,
            fund_limit: 20,
            transfer_limit: 10,
            cleanup_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("WALLET_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(secs) = std::env::var("WALLET_LOCK_TIMEOUT_SECS") {
            config.lock_timeout_secs = secs
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid lock timeout: {}", e)))?;
        }

        if let Ok(secs) = std::env::var("WALLET_IDEMPOTENCY_TTL_SECS") {
            config.idempotency.ttl_secs = secs
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid idempotency TTL: {}", e)))?;
        }

        Ok(config)
    }
}
