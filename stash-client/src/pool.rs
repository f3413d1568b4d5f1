//! # Connection Pool
//!
//! Purpose: Reuse TCP connections across commands and keep only healthy,
//! recently used connections around.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections.
//! 2. **Minimal Locking**: Hold the mutex only while moving idle connections;
//!    dialing and liveness probes run unlocked.
//! 3. **Test on Borrow**: Idle connections are PINGed before reuse and quietly
//!    replaced when the probe fails or they sat idle too long.
//! 4. **RAII Release**: `PooledConnection` returns itself on drop, so a
//!    connection is released on every exit path.

use std::collections::VecDeque;
use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::client::{ClientError, ClientResult};
use crate::resp::{encode_command, read_reply, Reply};

/// Pool configuration for the sync client.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Server address, e.g. "localhost:6379".
    pub addr: String,
    /// Maximum number of idle connections to keep.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use); `None` is unbounded.
    pub max_total: Option<usize>,
    /// Idle connections older than this are closed on borrow.
    pub idle_timeout: Option<Duration>,
    /// PING idle connections before handing them out.
    pub test_on_borrow: bool,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
}

/// Point-in-time pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections parked in the idle set.
    pub idle: usize,
    /// Connections alive, idle or checked out.
    pub total: usize,
}

struct IdleConnection {
    conn: Connection,
    since: Instant,
}

struct PoolState {
    idle: VecDeque<IdleConnection>,
    total: usize,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

/// Connection pool handle.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates a new connection pool. Connections are dialed lazily.
    pub fn new(config: PoolConfig) -> ClientResult<Self> {
        // Resolve once up front so a malformed address fails at construction.
        resolve_addr(&config.addr)?;

        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            total: 0,
        };
        Ok(ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(state),
            }),
        })
    }

    /// Acquires a connection, reusing a healthy idle one when possible.
    pub fn acquire(&self) -> ClientResult<PooledConnection> {
        self.prune_stale();
        while let Some(idle) = self.pop_idle() {
            if let Some(conn) = self.check_idle(idle) {
                return Ok(PooledConnection::new(self.inner.clone(), conn));
            }
        }

        if !self.try_reserve() {
            return Err(ClientError::PoolExhausted);
        }

        debug!(addr = %self.inner.config.addr, "dialing redis");
        match Connection::connect(&self.inner.config) {
            Ok(conn) => Ok(PooledConnection::new(self.inner.clone(), conn)),
            Err(err) => {
                self.release_slot();
                Err(err)
            }
        }
    }

    /// Returns current idle and total connection counts.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            idle: state.idle.len(),
            total: state.total,
        }
    }

    fn check_idle(&self, idle: IdleConnection) -> Option<Connection> {
        let IdleConnection { mut conn, since } = idle;

        if let Some(timeout) = self.inner.config.idle_timeout {
            if since.elapsed() >= timeout {
                debug!(idle_for = ?since.elapsed(), "closing stale idle connection");
                self.release_slot();
                return None;
            }
        }

        if self.inner.config.test_on_borrow {
            if let Err(err) = conn.ping() {
                debug!(error = %err, "idle connection failed liveness probe");
                self.release_slot();
                return None;
            }
        }

        Some(conn)
    }

    /// Closes idle connections past `idle_timeout`, oldest first.
    fn prune_stale(&self) {
        let Some(timeout) = self.inner.config.idle_timeout else {
            return;
        };
        let mut state = self.inner.state.lock();
        let mut closed = 0;
        while state.idle.front().is_some_and(|idle| idle.since.elapsed() >= timeout) {
            state.idle.pop_front();
            state.total = state.total.saturating_sub(1);
            closed += 1;
        }
        if closed > 0 {
            debug!(closed, "closed stale idle connections");
        }
    }

    // Most recently returned first, so surplus connections age out.
    fn pop_idle(&self) -> Option<IdleConnection> {
        self.inner.state.lock().idle.pop_back()
    }

    fn try_reserve(&self) -> bool {
        let mut state = self.inner.state.lock();
        if let Some(max_total) = self.inner.config.max_total {
            if state.total >= max_total {
                return false;
            }
        }
        state.total += 1;
        true
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock();
        state.total = state.total.saturating_sub(1);
    }

    fn return_connection(&self, conn: Connection) {
        let mut state = self.inner.state.lock();
        if state.idle.len() < self.inner.config.max_idle {
            state.idle.push_back(IdleConnection {
                conn,
                since: Instant::now(),
            });
        } else {
            state.total = state.total.saturating_sub(1);
        }
    }
}

/// RAII wrapper returning a connection to the pool on drop.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    valid: bool,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, conn: Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            valid: true,
        }
    }

    /// Executes a command and returns the parsed reply.
    pub fn exec(&mut self, args: &[&[u8]]) -> ClientResult<Reply> {
        let conn = self.conn.as_mut().expect("connection exists until drop");
        let reply = conn.exec(args);
        if reply.is_err() {
            // The stream may hold a partial reply; never reuse it.
            self.valid = false;
        }
        reply
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        let pool = ConnectionPool {
            inner: self.pool.clone(),
        };

        if self.valid {
            pool.return_connection(conn);
        } else {
            debug!("dropping broken connection");
            pool.release_slot();
        }
    }
}

/// Single TCP connection with reusable buffers.
struct Connection {
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Connection {
    fn connect(config: &PoolConfig) -> ClientResult<Self> {
        let addr = resolve_addr(&config.addr)?;
        let stream = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        stream.set_nodelay(true)?;

        Ok(Connection {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        })
    }

    fn exec(&mut self, args: &[&[u8]]) -> ClientResult<Reply> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_reply(&mut self.reader, &mut self.line_buf)
    }

    fn ping(&mut self) -> ClientResult<()> {
        match self.exec(&[b"PING"])? {
            Reply::Status(_) | Reply::Bulk(Some(_)) => Ok(()),
            Reply::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

/// Resolves a Redis address.
///
/// Accepts `host:port`, the `:port` shorthand for localhost, and an optional
/// `redis://` scheme prefix.
pub(crate) fn resolve_addr(addr: &str) -> ClientResult<SocketAddr> {
    let trimmed = addr.strip_prefix("redis://").unwrap_or(addr);
    let trimmed = trimmed.trim_end_matches('/');
    let target = if trimmed.starts_with(':') {
        format!("localhost{}", trimmed)
    } else {
        trimmed.to_string()
    };

    target
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ClientError::InvalidAddress(addr.to_string()))
}
