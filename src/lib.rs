//! Redis and SQL convenience layer.
//!
//! - [`kv`]: pooled Redis connections (dial, AUTH, SELECT, PING on checkout)
//!   and a small command facade
//! - [`db`]: column lists from struct annotations, timestamp and raw JSON
//!   column types, and statement event receivers
//! - [`config`]: Redis settings with defaults, merge and CLI/env parsing

extern crate self as redops;

pub mod config;
pub mod db;
pub mod error;
pub mod kv;

pub use config::Config;
pub use db::{JsonText, TimeStamp, collect_columns};
pub use error::{StoreError, StoreResult};
pub use kv::{Redis, RedisPool};
