//! # Synchronous Client API
//!
//! Purpose: Issue single Redis commands over pooled connections and map the
//! replies onto plain Rust results.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KVClient` hides pooling and protocol details.
//! 2. **Borrow-Friendly API**: Accept `&[u8]` keys and payloads.
//! 3. **One Command, One Connection**: Each call borrows a connection for one
//!    round trip and hands it back on drop.
//! 4. **Fail Fast**: Protocol violations surface immediately as errors.

use std::time::Duration;

use thiserror::Error;

use crate::pool::{ConnectionPool, PoolConfig, PoolStats};
use crate::resp::Reply;

/// Default Redis endpoint.
pub const DEFAULT_ADDR: &str = "localhost:6379";

/// Result type for the sync client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the sync client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while dialing, reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RESP2 framing or parse error, including a peer that hung up.
    #[error("protocol error")]
    Protocol,
    /// Server returned an error reply.
    #[error("server error: {}", String::from_utf8_lossy(.message))]
    Server { message: Vec<u8> },
    /// Reply type did not match the command.
    #[error("unexpected response")]
    UnexpectedResponse,
    /// Pool is at capacity and no idle connections are available.
    #[error("connection pool exhausted")]
    PoolExhausted,
    /// Address could not be resolved to a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Expiry attached to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// `EX`: whole seconds.
    Seconds(u64),
    /// `PX`: milliseconds.
    Millis(u64),
}

impl Expiry {
    fn option(&self) -> &'static [u8] {
        match self {
            Expiry::Seconds(_) => b"EX",
            Expiry::Millis(_) => b"PX",
        }
    }

    fn amount(&self) -> u64 {
        match self {
            Expiry::Seconds(value) | Expiry::Millis(value) => *value,
        }
    }
}

/// Configuration for the synchronous client and its pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "localhost:6379" or ":6379".
    pub addr: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use); `None` is unbounded.
    pub max_total: Option<usize>,
    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout: Option<Duration>,
    /// Probe idle connections with PING before handing them out.
    pub test_on_borrow: bool,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: DEFAULT_ADDR.to_string(),
            max_idle: 3,
            max_total: None,
            idle_timeout: Some(Duration::from_secs(240)),
            test_on_borrow: true,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

/// Synchronous client with connection pooling.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Clone)]
pub struct KVClient {
    pool: ConnectionPool,
}

impl KVClient {
    /// Creates a client with default configuration.
    pub fn connect(addr: impl Into<String>) -> ClientResult<Self> {
        let config = ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        };
        Self::with_config(config)
    }

    /// Creates a client with a custom configuration.
    ///
    /// No connection is dialed until the first command.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let pool = ConnectionPool::new(PoolConfig {
            addr: config.addr,
            max_idle: config.max_idle,
            max_total: config.max_total,
            idle_timeout: config.idle_timeout,
            test_on_borrow: config.test_on_borrow,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            connect_timeout: config.connect_timeout,
        })?;
        Ok(KVClient { pool })
    }

    /// Current pool occupancy.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Fetches a value by key. Returns `Ok(None)` when the key is missing.
    pub fn get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        self.exec(&[b"GET", key])?.into_bytes()
    }

    /// Sets a value for a key without expiration.
    pub fn set(&self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        expect_ok(self.exec(&[b"SET", key, value])?)
    }

    /// Sets a value that the server removes once `expiry` elapses.
    pub fn set_with_expiry(&self, key: &[u8], value: &[u8], expiry: Expiry) -> ClientResult<()> {
        let amount = expiry.amount().to_string();
        expect_ok(self.exec(&[b"SET", key, value, expiry.option(), amount.as_bytes()])?)
    }

    /// Sets one field of the hash stored at `key`.
    pub fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> ClientResult<()> {
        match self.exec(&[b"HSET", key, field, value])? {
            // HSET answers with the number of new fields; HMSET-style
            // servers answer +OK.
            Reply::Integer(_) => Ok(()),
            reply if reply.is_ok() => Ok(()),
            other => unexpected(other),
        }
    }

    /// Fetches one field of the hash stored at `key`.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        self.exec(&[b"HGET", key, field])?.into_bytes()
    }

    /// Deletes a key. Returns true when a key was removed.
    pub fn del(&self, key: &[u8]) -> ClientResult<bool> {
        expect_count(self.exec(&[b"DEL", key])?)
    }

    /// Deletes a hash field. Returns true when a field was removed.
    pub fn hdel(&self, key: &[u8], field: &[u8]) -> ClientResult<bool> {
        expect_count(self.exec(&[b"HDEL", key, field])?)
    }

    /// Pings the server. Returns the raw response payload.
    pub fn ping(&self) -> ClientResult<Vec<u8>> {
        match self.exec(&[b"PING"])? {
            Reply::Status(text) => Ok(text),
            Reply::Bulk(Some(data)) => Ok(data),
            other => unexpected(other),
        }
    }

    fn exec(&self, args: &[&[u8]]) -> ClientResult<Reply> {
        let mut conn = self.pool.acquire()?;
        conn.exec(args)
    }
}

fn expect_ok(reply: Reply) -> ClientResult<()> {
    if reply.is_ok() {
        return Ok(());
    }
    unexpected(reply)
}

fn expect_count(reply: Reply) -> ClientResult<bool> {
    match reply {
        Reply::Integer(count) => Ok(count > 0),
        other => unexpected(other),
    }
}

fn unexpected<T>(reply: Reply) -> ClientResult<T> {
    match reply {
        Reply::Error(message) => Err(ClientError::Server { message }),
        _ => Err(ClientError::UnexpectedResponse),
    }
}
