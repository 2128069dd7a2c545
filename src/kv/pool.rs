//! Pooled Redis connections.
//!
//! [`RedisManager`] is the connection factory handed to the pool: it dials,
//! authenticates and selects the logical database for every new connection,
//! and health-checks connections before they are handed out again. Pool
//! bookkeeping itself (sizing, waiting, handing out) is deadpool's.
//!
//! Idle time is measured from the moment a [`PooledConnection`] is dropped
//! or released, so time spent in use never counts towards `idle_timeout`.

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use deadpool::Runtime;
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use redis::aio::MultiplexedConnection;
use redis::{Client, Cmd, RedisError, Value};
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Time allowed for dial + AUTH + SELECT, and for the PING health check.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes a single command on some connection and returns the raw reply.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, cmd: &Cmd) -> impl Future<Output = StoreResult<Value>> + Send;
}

/// Build the client URL for a network/address pair.
pub fn connection_url(network: &str, addr: &str) -> StoreResult<Url> {
    let url = match network {
        "tcp" => format!("redis://{addr}"),
        "unix" => format!("redis+unix://{addr}"),
        other => {
            return Err(StoreError::config(format!(
                "unsupported network {other:?}"
            )));
        }
    };
    Url::parse(&url).map_err(|e| StoreError::config(format!("invalid address {addr:?}: {e}")))
}

/// Open a connection and authenticate it when a password is configured.
pub async fn dial(network: &str, addr: &str, password: &str) -> StoreResult<MultiplexedConnection> {
    let url = connection_url(network, addr)?;
    let client = Client::open(url.as_str())?;
    let mut conn = client.get_multiplexed_async_connection().await?;
    if !password.is_empty() {
        let _: Value = redis::cmd("AUTH").arg(password).query_async(&mut conn).await?;
        debug!(addr = %addr, "Authenticated");
    }
    Ok(conn)
}

/// Time since a connection was last handed back to the pool.
#[derive(Debug, Clone, Copy)]
struct IdleClock {
    since: Instant,
}

impl IdleClock {
    fn start() -> Self {
        Self {
            since: Instant::now(),
        }
    }

    fn reset(&mut self) {
        self.since = Instant::now();
    }

    fn elapsed(&self) -> Duration {
        self.since.elapsed()
    }

    /// A zero timeout never expires.
    fn exceeds(&self, timeout: Duration) -> bool {
        !timeout.is_zero() && self.elapsed() > timeout
    }
}

/// A live connection as stored in the pool.
pub struct RedisConnection {
    conn: MultiplexedConnection,
    idle: IdleClock,
    discarded: bool,
}

impl RedisConnection {
    fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            idle: IdleClock::start(),
            discarded: false,
        }
    }

    /// How long the connection has been sitting in the pool.
    pub fn idle_for(&self) -> Duration {
        self.idle.elapsed()
    }
}

/// Connection factory and health check for the pool.
#[derive(Debug, Clone)]
pub struct RedisManager {
    config: Config,
}

impl RedisManager {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn connect(&self) -> StoreResult<MultiplexedConnection> {
        let config = &self.config;
        let mut conn = dial(&config.network, &config.addr, &config.password).await?;
        let _: Value = redis::cmd("SELECT")
            .arg(config.database)
            .query_async(&mut conn)
            .await?;
        info!(
            network = %config.network,
            addr = %config.addr,
            database = config.database,
            "Opened Redis connection"
        );
        Ok(conn)
    }
}

impl managed::Manager for RedisManager {
    type Type = RedisConnection;
    type Error = RedisError;

    async fn create(&self) -> Result<RedisConnection, RedisError> {
        self.connect().await.map(RedisConnection::new).map_err(|e| match e {
            StoreError::Redis(err) => err,
            other => RedisError::from((
                redis::ErrorKind::InvalidClientConfig,
                "invalid connection settings",
                other.to_string(),
            )),
        })
    }

    async fn recycle(
        &self,
        conn: &mut RedisConnection,
        _metrics: &Metrics,
    ) -> RecycleResult<RedisError> {
        if conn.discarded {
            return Err(RecycleError::Message("connection over the idle limit".into()));
        }
        if conn.idle.exceeds(self.config.idle_timeout) {
            debug!(
                idle_secs = conn.idle_for().as_secs(),
                "Discarding idle Redis connection"
            );
            return Err(RecycleError::Message("idle timeout exceeded".into()));
        }
        let reply: Value = redis::cmd("PING").query_async(&mut conn.conn).await.map_err(|e| {
            warn!(error = %e, "Redis health check failed");
            RecycleError::Backend(e)
        })?;
        if is_pong(&reply) {
            Ok(())
        } else {
            Err(RecycleError::Message("unexpected PING reply".into()))
        }
    }
}

pub(crate) fn is_pong(reply: &Value) -> bool {
    match reply {
        Value::SimpleString(s) => s == "PONG",
        Value::BulkString(bytes) => bytes.as_slice() == b"PONG",
        _ => false,
    }
}

/// Redis connection pool.
#[derive(Clone)]
pub struct RedisPool {
    pool: managed::Pool<RedisManager>,
    max_idle: usize,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish()
    }
}

/// A connection checked out of a [`RedisPool`].
///
/// Dropping it returns the connection to the pool and starts its idle clock.
pub struct PooledConnection(managed::Object<RedisManager>);

impl Deref for PooledConnection {
    type Target = MultiplexedConnection;

    fn deref(&self) -> &MultiplexedConnection {
        &self.0.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut MultiplexedConnection {
        &mut self.0.conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.0.idle.reset();
    }
}

impl RedisPool {
    /// Build a pool. No connection is opened until the first acquire.
    ///
    /// Empty network/address and a zero idle timeout fall back to the
    /// defaults.
    pub fn new(config: Config) -> StoreResult<Self> {
        let config = Config::default().merge(config);
        config.validate()?;
        // validate early so a bad address fails here, not on first use
        connection_url(&config.network, &config.addr)?;

        let mut builder = managed::Pool::builder(RedisManager::new(config.clone()))
            .runtime(Runtime::Tokio1)
            .create_timeout(Some(CONNECT_TIMEOUT))
            .recycle_timeout(Some(CONNECT_TIMEOUT));
        if config.max_active > 0 {
            builder = builder.max_size(config.max_active);
        }
        let pool = builder
            .build()
            .map_err(|e| StoreError::config(format!("failed to build pool: {e}")))?;

        debug!(
            addr = %config.addr,
            max_size = pool.status().max_size,
            "Created Redis pool"
        );
        Ok(Self {
            pool,
            max_idle: config.max_idle,
        })
    }

    /// Take a connection from the pool, opening one if none is idle.
    pub async fn acquire(&self) -> StoreResult<PooledConnection> {
        Ok(PooledConnection(self.pool.get().await?))
    }

    /// Hand a connection back. With `max_idle` set, a connection that would
    /// exceed the idle limit is closed instead of parked.
    pub fn release(&self, mut conn: PooledConnection) {
        let surplus = self.max_idle > 0 && self.pool.status().available >= self.max_idle;
        if surplus {
            conn.0.discarded = true;
        }
        drop(conn);
        if surplus {
            debug!(max_idle = self.max_idle, "Closing surplus idle Redis connection");
            let _ = self.pool.retain(|conn, _| !conn.discarded);
        }
    }

    pub fn status(&self) -> managed::Status {
        self.pool.status()
    }

    /// Close the pool; later acquires fail.
    pub fn close(&self) {
        self.pool.close();
    }
}

impl CommandExecutor for RedisPool {
    async fn execute(&self, cmd: &Cmd) -> StoreResult<Value> {
        let mut conn = self.acquire().await?;
        let reply: Value = cmd.query_async(&mut *conn).await?;
        self.release(conn);
        Ok(reply)
    }
}
