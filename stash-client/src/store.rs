//! # Store Accessor
//!
//! Purpose: Typed `Get/Set/HGet/HSet/Del/HDel` over namespaced Redis keys.
//!
//! ## Design Principles
//! 1. **Immutable Configuration**: The hashing flag is fixed at construction
//!    and the store is shared read-only between callers.
//! 2. **Absence Is Not Failure**: Missing keys and fields come back as
//!    `Ok(None)`; deleting something absent is `Ok(())`.
//! 3. **Marshal Before Dial**: A value that cannot be encoded never costs a
//!    connection.
//! 4. **No Hidden Recovery**: Errors are returned as-is; nothing is retried.
//!
//! ## Usage
//!
//! ```no_run
//! use stash_client::{Json, Store, StoreConfig};
//!
//! let store = Store::with_config(StoreConfig::builder().hash_keys(true).build())?;
//! store.set(&["sessions", "alice"], "token")?;
//! store.hset(&["users", "alice"], "profile", &Json(serde_json::json!({"age": 30})))?;
//! let token = store.get(&["sessions", "alice"])?;
//! assert_eq!(token.as_deref(), Some(&b"token"[..]));
//! # Ok::<(), stash_client::StoreError>(())
//! ```

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::trace;

use stash_common::{build_key, from_json, Marshal, ValueError};

use crate::client::{ClientError, Expiry, KVClient};
use crate::config::StoreConfig;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the store accessor.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Dial, liveness probe, transport or framing failure.
    #[error("connection error: {0}")]
    Connection(#[source] ClientError),

    /// The value could not be turned into a payload; nothing was sent.
    #[error("serialization error: {0}")]
    Serialization(#[source] ValueError),

    /// A stored value could not be read back as requested.
    #[error("deserialization error: {0}")]
    Deserialization(#[source] ValueError),

    /// Redis rejected the command, e.g. `WRONGTYPE`.
    #[error("server error: {message}")]
    Server { message: String },

    /// Invalid configuration input.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<ClientError> for StoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Server { message } => StoreError::Server {
                message: String::from_utf8_lossy(&message).into_owned(),
            },
            other => StoreError::Connection(other),
        }
    }
}

/// Typed accessor over a pooled Redis client.
///
/// Cloning is cheap and clones share the pool.
#[derive(Clone)]
pub struct Store {
    client: KVClient,
    hash_keys: bool,
}

impl Store {
    /// Wraps an existing client.
    pub fn new(client: KVClient, hash_keys: bool) -> Self {
        Store { client, hash_keys }
    }

    /// Store with default pool settings and hashing disabled.
    pub fn connect(addr: impl Into<String>) -> StoreResult<Self> {
        Self::with_config(StoreConfig::builder().addr(addr).build())
    }

    /// Store built from a full configuration.
    pub fn with_config(config: StoreConfig) -> StoreResult<Self> {
        let client = KVClient::with_config(config.client_config())?;
        Ok(Store::new(client, config.hash_keys))
    }

    /// Whether identifiers are SHA-1 hashed.
    pub fn hash_keys(&self) -> bool {
        self.hash_keys
    }

    /// The underlying client.
    pub fn client(&self) -> &KVClient {
        &self.client
    }

    /// The key this store uses for `namespace`.
    pub fn key<S: AsRef<str>>(&self, namespace: &[S]) -> String {
        build_key(self.hash_keys, namespace)
    }

    /// Stores `value` at the namespaced key.
    pub fn set<S, V>(&self, namespace: &[S], value: &V) -> StoreResult<()>
    where
        S: AsRef<str>,
        V: Marshal + ?Sized,
    {
        let payload = value.marshal().map_err(StoreError::Serialization)?;
        let key = self.key(namespace);
        trace!(%key, kind = ?value.kind(), "set");
        Ok(self.client.set(key.as_bytes(), &payload)?)
    }

    /// Stores `value` and lets Redis drop it after `expiry`.
    pub fn set_with_expiry<S, V>(&self, namespace: &[S], value: &V, expiry: Expiry) -> StoreResult<()>
    where
        S: AsRef<str>,
        V: Marshal + ?Sized,
    {
        let payload = value.marshal().map_err(StoreError::Serialization)?;
        let key = self.key(namespace);
        trace!(%key, kind = ?value.kind(), ?expiry, "set with expiry");
        Ok(self.client.set_with_expiry(key.as_bytes(), &payload, expiry)?)
    }

    /// `set_with_expiry` with a TTL in seconds.
    pub fn set_ex<S, V>(&self, namespace: &[S], value: &V, seconds: u64) -> StoreResult<()>
    where
        S: AsRef<str>,
        V: Marshal + ?Sized,
    {
        self.set_with_expiry(namespace, value, Expiry::Seconds(seconds))
    }

    /// `set_with_expiry` with a TTL in milliseconds.
    pub fn set_px<S, V>(&self, namespace: &[S], value: &V, millis: u64) -> StoreResult<()>
    where
        S: AsRef<str>,
        V: Marshal + ?Sized,
    {
        self.set_with_expiry(namespace, value, Expiry::Millis(millis))
    }

    /// Reads the raw payload at the namespaced key.
    pub fn get<S: AsRef<str>>(&self, namespace: &[S]) -> StoreResult<Option<Vec<u8>>> {
        let key = self.key(namespace);
        trace!(%key, "get");
        read_payload(self.client.get(key.as_bytes()))
    }

    /// Reads and JSON-decodes the value at the namespaced key.
    pub fn get_json<T, S>(&self, namespace: &[S]) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
    {
        decode_json(self.get(namespace)?)
    }

    /// Stores `value` under `field` of the hash at the namespaced key.
    pub fn hset<S, V>(&self, namespace: &[S], field: &str, value: &V) -> StoreResult<()>
    where
        S: AsRef<str>,
        V: Marshal + ?Sized,
    {
        let payload = value.marshal().map_err(StoreError::Serialization)?;
        let key = self.key(namespace);
        trace!(%key, field, kind = ?value.kind(), "hset");
        Ok(self.client.hset(key.as_bytes(), field.as_bytes(), &payload)?)
    }

    /// Reads `field` of the hash at the namespaced key.
    pub fn hget<S: AsRef<str>>(&self, namespace: &[S], field: &str) -> StoreResult<Option<Vec<u8>>> {
        let key = self.key(namespace);
        trace!(%key, field, "hget");
        read_payload(self.client.hget(key.as_bytes(), field.as_bytes()))
    }

    /// Reads and JSON-decodes `field` of the hash at the namespaced key.
    pub fn hget_json<T, S>(&self, namespace: &[S], field: &str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
    {
        decode_json(self.hget(namespace, field)?)
    }

    /// Deletes the namespaced key. Absent keys are not an error.
    pub fn del<S: AsRef<str>>(&self, namespace: &[S]) -> StoreResult<()> {
        let key = self.key(namespace);
        trace!(%key, "del");
        self.client.del(key.as_bytes())?;
        Ok(())
    }

    /// Deletes `field` from the hash at the namespaced key.
    pub fn hdel<S: AsRef<str>>(&self, namespace: &[S], field: &str) -> StoreResult<()> {
        let key = self.key(namespace);
        trace!(%key, field, "hdel");
        self.client.hdel(key.as_bytes(), field.as_bytes())?;
        Ok(())
    }

    /// Round-trips a PING.
    pub fn ping(&self) -> StoreResult<()> {
        self.client.ping()?;
        Ok(())
    }
}

fn read_payload(result: Result<Option<Vec<u8>>, ClientError>) -> StoreResult<Option<Vec<u8>>> {
    match result {
        Ok(payload) => Ok(payload),
        Err(ClientError::UnexpectedResponse) => Err(StoreError::Deserialization(ValueError::NotBytes)),
        Err(err) => Err(err.into()),
    }
}

fn decode_json<T: DeserializeOwned>(payload: Option<Vec<u8>>) -> StoreResult<Option<T>> {
    payload
        .map(|bytes| from_json(&bytes))
        .transpose()
        .map_err(StoreError::Deserialization)
}
