//! Configuration for a `Store`.
//!
//! Centralized configuration with defaults matching a local Redis, loadable
//! from JSON or from `REDISTASH_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{ClientConfig, DEFAULT_ADDR};
use crate::store::{StoreError, StoreResult};

/// Environment variable holding the Redis address.
pub const ENV_ADDR: &str = "REDISTASH_ADDR";

/// Environment variable toggling identifier hashing.
pub const ENV_HASH_KEYS: &str = "REDISTASH_HASH_KEYS";

/// Environment variable overriding the idle connection cap.
pub const ENV_MAX_IDLE: &str = "REDISTASH_MAX_IDLE";

/// Store configuration: endpoint, key hashing, and pool tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis address (`host:port`, `:port`, or `redis://host:port`)
    pub addr: String,

    /// SHA-1 hash the identifier component of every key
    pub hash_keys: bool,

    /// Max idle connections kept in the pool
    pub max_idle: usize,

    /// Max connections in total; unbounded when absent
    pub max_total: Option<usize>,

    /// Close idle connections after this long (milliseconds, 0 disables)
    pub idle_timeout_ms: u64,

    /// PING idle connections before reuse
    pub test_on_borrow: bool,

    /// TCP connect timeout (milliseconds)
    pub connect_timeout_ms: Option<u64>,

    /// TCP read timeout (milliseconds)
    pub read_timeout_ms: Option<u64>,

    /// TCP write timeout (milliseconds)
    pub write_timeout_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            hash_keys: false,
            max_idle: 3,
            max_total: None,
            idle_timeout_ms: 240_000,
            test_on_borrow: true,
            connect_timeout_ms: None,
            read_timeout_ms: None,
            write_timeout_ms: None,
        }
    }
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json(text: &str) -> StoreResult<Self> {
        serde_json::from_str(text).map_err(|err| StoreError::Config(err.to_string()))
    }

    /// Defaults overridden by any `REDISTASH_*` variables that are set.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let mut config = Self::default();
        if let Some(addr) = lookup(ENV_ADDR) {
            config.addr = addr;
        }
        if let Some(raw) = lookup(ENV_HASH_KEYS) {
            config.hash_keys = parse_flag(&raw).ok_or_else(|| {
                StoreError::Config(format!("{ENV_HASH_KEYS}: expected a boolean, got {raw:?}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_MAX_IDLE) {
            config.max_idle = raw.trim().parse().map_err(|_| {
                StoreError::Config(format!("{ENV_MAX_IDLE}: expected a count, got {raw:?}"))
            })?;
        }
        Ok(config)
    }

    /// Pool and socket settings for the underlying client.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            addr: self.addr.clone(),
            max_idle: self.max_idle,
            max_total: self.max_total,
            idle_timeout: (self.idle_timeout_ms > 0)
                .then(|| Duration::from_millis(self.idle_timeout_ms)),
            test_on_borrow: self.test_on_borrow,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
            write_timeout: self.write_timeout_ms.map(Duration::from_millis),
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the Redis address
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Enable or disable identifier hashing
    pub fn hash_keys(mut self, hash: bool) -> Self {
        self.config.hash_keys = hash;
        self
    }

    /// Set the idle connection cap
    pub fn max_idle(mut self, count: usize) -> Self {
        self.config.max_idle = count;
        self
    }

    /// Cap the total number of connections
    pub fn max_total(mut self, count: usize) -> Self {
        self.config.max_total = Some(count);
        self
    }

    /// Set the idle timeout (in milliseconds, 0 disables)
    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    /// Enable or disable the PING probe on borrow
    pub fn test_on_borrow(mut self, enabled: bool) -> Self {
        self.config.test_on_borrow = enabled;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = Some(ms);
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = Some(ms);
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = Some(ms);
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
