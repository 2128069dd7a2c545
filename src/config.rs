//! Configuration handling for redops.
//!
//! `Config` is the plain Redis options struct; `Cli` is the command line /
//! environment surface of the binary. Options the user leaves unset stay at
//! their zero value and fall back to [`Config::default`] through
//! [`Config::merge`].

use crate::error::{StoreError, StoreResult};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

/// Default Redis network, "tcp".
pub const DEFAULT_REDIS_NETWORK: &str = "tcp";
/// Default Redis address, "127.0.0.1:6379".
pub const DEFAULT_REDIS_ADDR: &str = "127.0.0.1:6379";
/// Default idle timeout for pooled connections (5 minutes).
pub const DEFAULT_REDIS_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Redis connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// "tcp" or "unix"
    pub network: String,
    /// host:port for tcp, socket path for unix
    pub addr: String,
    /// Sent with AUTH when non-empty (sensitive - never log)
    pub password: String,
    /// Logical database selected on every new connection
    pub database: i64,
    pub max_idle: usize,
    /// 0 lets the pool pick its own size
    pub max_active: usize,
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: DEFAULT_REDIS_NETWORK.to_string(),
            addr: DEFAULT_REDIS_ADDR.to_string(),
            password: String::new(),
            database: 0,
            max_idle: 0,
            max_active: 0,
            idle_timeout: DEFAULT_REDIS_IDLE_TIMEOUT,
        }
    }
}

impl Config {
    /// Merge `other` over `self`.
    ///
    /// Non-zero fields of `other` win; zero or empty fields are taken from
    /// `self`.
    pub fn merge(&self, other: Config) -> Config {
        fn pick<T: PartialEq + Default + Clone>(value: T, fallback: &T) -> T {
            if value == T::default() {
                fallback.clone()
            } else {
                value
            }
        }

        Config {
            network: pick(other.network, &self.network),
            addr: pick(other.addr, &self.addr),
            password: pick(other.password, &self.password),
            database: pick(other.database, &self.database),
            max_idle: pick(other.max_idle, &self.max_idle),
            max_active: pick(other.max_active, &self.max_active),
            idle_timeout: pick(other.idle_timeout, &self.idle_timeout),
        }
    }

    /// Validate the configuration and return an error if invalid.
    pub fn validate(&self) -> StoreResult<()> {
        match self.network.as_str() {
            "tcp" | "unix" => {}
            other => {
                return Err(StoreError::config(format!(
                    "network must be \"tcp\" or \"unix\", got {other:?}"
                )));
            }
        }
        if self.addr.is_empty() {
            return Err(StoreError::config("addr must not be empty"));
        }
        if self.database < 0 {
            return Err(StoreError::config(format!(
                "database must not be negative, got {}",
                self.database
            )));
        }
        Ok(())
    }
}

/// Redis options as given on the command line or through the environment.
#[derive(Debug, Clone, Default, Args)]
pub struct RedisArgs {
    /// Network type: tcp or unix
    #[arg(long = "redis-network", env = "REDIS_NETWORK", value_name = "NETWORK")]
    pub network: Option<String>,

    /// Server address (host:port, or socket path for unix)
    #[arg(long = "redis-addr", env = "REDIS_ADDR", value_name = "ADDR")]
    pub addr: Option<String>,

    /// Password sent with AUTH
    #[arg(
        long = "redis-password",
        env = "REDIS_PASSWORD",
        value_name = "PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// Logical database index selected after connecting
    #[arg(long = "redis-database", env = "REDIS_DATABASE", value_name = "INDEX")]
    pub database: Option<i64>,

    /// Maximum idle connections
    #[arg(long, env = "REDIS_MAX_IDLE")]
    pub max_idle: Option<usize>,

    /// Maximum active connections (0 = pool default)
    #[arg(long, env = "REDIS_MAX_ACTIVE")]
    pub max_active: Option<usize>,

    /// Idle timeout in seconds
    #[arg(long = "idle-timeout", env = "REDIS_IDLE_TIMEOUT", value_name = "SECS")]
    pub idle_timeout_secs: Option<u64>,
}

impl RedisArgs {
    /// Options left unset become zero values, ready for [`Config::merge`].
    pub fn to_config(&self) -> Config {
        Config {
            network: self.network.clone().unwrap_or_default(),
            addr: self.addr.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
            database: self.database.unwrap_or_default(),
            max_idle: self.max_idle.unwrap_or_default(),
            max_active: self.max_active.unwrap_or_default(),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs.unwrap_or_default()),
        }
    }
}

/// Command line interface of the `redops` binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "redops",
    about = "Run single Redis commands through a pooled, authenticated connection",
    version,
    author
)]
pub struct Cli {
    #[command(flatten)]
    pub redis: RedisArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "REDOPS_LOG_LEVEL")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long, env = "REDOPS_JSON_LOGS")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Effective Redis configuration: CLI/env values over the defaults.
    pub fn redis_config(&self) -> StoreResult<Config> {
        let config = Config::default().merge(self.redis.to_config());
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Send PING and report whether PONG came back
    Ping,
    /// GET a key as a string
    Get { key: String },
    /// DEL one or more keys
    Del {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// HGETALL a hash
    Hgetall { key: String },
    /// HMSET field/value pairs on a hash
    Hmset {
        key: String,
        /// FIELD VALUE [FIELD VALUE ...]
        #[arg(required = true, num_args = 2..)]
        pairs: Vec<String>,
    },
}
