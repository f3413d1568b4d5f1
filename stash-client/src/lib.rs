//! # redistash Sync Client
//!
//! Purpose: Provide a typed, synchronous accessor over Redis with namespaced
//! keys and a small pooled RESP2 client underneath.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse TCP connections to avoid repeated connects.
//! 2. **Thin Wrapper**: One logical operation is exactly one Redis command.
//! 3. **Minimal Allocation**: Reuse buffers for RESP framing and parsing.
//! 4. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.

mod client;
mod config;
mod pool;
mod resp;
mod store;

pub use client::{ClientConfig, ClientError, ClientResult, Expiry, KVClient, DEFAULT_ADDR};
pub use config::{StoreConfig, StoreConfigBuilder, ENV_ADDR, ENV_HASH_KEYS, ENV_MAX_IDLE};
pub use pool::{ConnectionPool, PoolConfig, PoolStats, PooledConnection};
pub use resp::Reply;
pub use store::{Store, StoreError, StoreResult};

pub use stash_common::{build_key, sha1_hex, Json, Marshal, PayloadKind, ValueError};
