//! Redis access: a deadpool-managed connection pool and a command facade.

pub mod commands;
pub mod pool;

pub use commands::Redis;
pub use pool::{
    CommandExecutor, PooledConnection, RedisConnection, RedisManager, RedisPool, connection_url,
    dial,
};
