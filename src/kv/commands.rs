//! Single-command Redis helpers.
//!
//! Every call acquires a connection, issues one command and releases the
//! connection again.

use crate::error::{StoreError, StoreResult};
use crate::kv::pool::{CommandExecutor, RedisPool, is_pong};
use redis::{Cmd, FromRedisValue, Value};
use std::collections::HashMap;
use tracing::debug;

/// Redis command facade.
#[derive(Debug, Clone)]
pub struct Redis<E: CommandExecutor = RedisPool> {
    executor: E,
}

impl Redis<RedisPool> {
    /// Build a pool from `config` and wrap it.
    pub fn connect(config: crate::config::Config) -> StoreResult<Self> {
        Ok(Self::new(RedisPool::new(config)?))
    }
}

impl<E: CommandExecutor> Redis<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    async fn run(&self, name: &'static str, cmd: &Cmd) -> StoreResult<Value> {
        debug!(command = name, "Executing Redis command");
        self.executor.execute(cmd).await
    }

    /// `PING`; true iff the server answered `PONG`.
    pub async fn ping(&self) -> StoreResult<bool> {
        let reply = self.run("PING", &redis::cmd("PING")).await?;
        Ok(is_pong(&reply))
    }

    /// `GET key`; `None` when the key does not exist.
    pub async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let reply = self.run("GET", &cmd).await?;
        Ok(redis::from_redis_value(&reply)?)
    }

    /// `GET key` as a string. A missing key is an error.
    pub async fn get_string(&self, key: &str) -> StoreResult<String> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let reply = self.run("GET", &cmd).await?;
        Ok(redis::from_redis_value(&reply)?)
    }

    /// `HMSET key field value [field value ...]`
    pub async fn hmset<F, V>(&self, key: &str, pairs: &[(F, V)]) -> StoreResult<()>
    where
        F: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let mut cmd = redis::cmd("HMSET");
        cmd.arg(key);
        for (field, value) in pairs {
            cmd.arg(field.as_ref()).arg(value.as_ref());
        }
        self.run("HMSET", &cmd).await?;
        Ok(())
    }

    /// `HGETALL key` as field/value pairs in reply order.
    pub async fn hgetall(&self, key: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(key);
        let reply = self.run("HGETALL", &cmd).await?;
        hash_pairs(&reply)
    }

    /// `HGETALL key` as a string map.
    pub async fn hgetall_map(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(key);
        let reply = self.run("HGETALL", &cmd).await?;
        Ok(hash_pairs(&reply)?.into_iter().collect())
    }

    /// `DEL key [key ...]`; returns how many keys were removed.
    pub async fn del<K: AsRef<str>>(&self, keys: &[K]) -> StoreResult<i64> {
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key.as_ref());
        }
        let reply = self.run("DEL", &cmd).await?;
        Ok(redis::from_redis_value(&reply)?)
    }
}

/// Decode a hash reply: a flat field/value array (RESP2) or a map (RESP3).
fn hash_pairs<V: FromRedisValue>(reply: &Value) -> StoreResult<Vec<(String, V)>> {
    match reply {
        Value::Nil => Ok(Vec::new()),
        Value::Array(items) => {
            if items.len() % 2 != 0 {
                return Err(StoreError::type_mismatch(
                    "field/value pairs",
                    "odd-length array",
                ));
            }
            items
                .chunks(2)
                .map(|pair| {
                    Ok((
                        redis::from_redis_value(&pair[0])?,
                        redis::from_redis_value(&pair[1])?,
                    ))
                })
                .collect()
        }
        Value::Map(entries) => entries
            .iter()
            .map(|(field, value)| {
                Ok((
                    redis::from_redis_value(field)?,
                    redis::from_redis_value(value)?,
                ))
            })
            .collect(),
        _ => Err(StoreError::type_mismatch("array or map", "scalar reply")),
    }
}
