//! Runs against a live server; set TEST_REDIS_ADDR (host:port) to enable.
//! TEST_REDIS_PASSWORD and TEST_REDIS_DATABASE are optional.

use redops::kv::PooledConnection;
use redops::{Config, Redis, RedisPool, StoreError};
use std::time::Duration;

fn test_config() -> Option<Config> {
    let addr = std::env::var("TEST_REDIS_ADDR").ok()?;
    Some(Config {
        addr,
        password: std::env::var("TEST_REDIS_PASSWORD").unwrap_or_default(),
        database: std::env::var("TEST_REDIS_DATABASE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        max_active: 2,
        ..Config::default()
    })
}

macro_rules! redis_or_skip {
    () => {
        match test_config() {
            Some(config) => Redis::new(RedisPool::new(config).unwrap()),
            None => {
                eprintln!("Skipping test: TEST_REDIS_ADDR not set");
                return;
            }
        }
    };
}

fn unique_key(name: &str) -> String {
    format!("redops:test:{name}:{}", std::process::id())
}

#[tokio::test]
async fn test_ping() {
    let redis = redis_or_skip!();
    assert!(redis.ping().await.unwrap());
}

#[tokio::test]
async fn test_hash_round_trip() {
    let redis = redis_or_skip!();
    let key = unique_key("hash");

    redis
        .hmset(&key, &[("name", "ann"), ("lang", "rust")])
        .await
        .unwrap();

    let map = redis.hgetall_map(&key).await.unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["name"], "ann");

    let pairs = redis.hgetall(&key).await.unwrap();
    assert!(pairs.contains(&("lang".to_string(), b"rust".to_vec())));

    assert_eq!(redis.del(&[key.as_str()]).await.unwrap(), 1);
    assert!(redis.hgetall(&key).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_key() {
    let redis = redis_or_skip!();
    let key = unique_key("missing");

    assert_eq!(redis.get(&key).await.unwrap(), None);
    assert!(matches!(
        redis.get_string(&key).await,
        Err(StoreError::Redis(_))
    ));
    assert_eq!(redis.del(&[key]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_pool_reuses_connections() {
    let Some(config) = test_config() else {
        eprintln!("Skipping test: TEST_REDIS_ADDR not set");
        return;
    };
    let pool = RedisPool::new(config).unwrap();
    let redis = Redis::new(pool.clone());

    for _ in 0..5 {
        assert!(redis.ping().await.unwrap());
    }
    let status = pool.status();
    assert!(status.size <= 2);
    assert!(status.size >= 1);
}

#[tokio::test]
async fn test_wrong_password_fails_on_use() {
    let Some(config) = test_config() else {
        eprintln!("Skipping test: TEST_REDIS_ADDR not set");
        return;
    };
    if !config.password.is_empty() {
        // only meaningful against a server with auth disabled
        return;
    }
    let redis = Redis::new(
        RedisPool::new(Config {
            password: "definitely-wrong".to_string(),
            ..config
        })
        .unwrap(),
    );
    assert!(redis.ping().await.is_err());
}

async fn client_id(conn: &mut PooledConnection) -> i64 {
    redis::cmd("CLIENT")
        .arg("ID")
        .query_async(&mut **conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_idle_timeout_ignores_time_in_use() {
    let Some(config) = test_config() else {
        eprintln!("Skipping test: TEST_REDIS_ADDR not set");
        return;
    };
    let pool = RedisPool::new(Config {
        idle_timeout: Duration::from_millis(500),
        max_active: 1,
        ..config
    })
    .unwrap();

    // held longer than the timeout, then reused straight away
    let mut conn = pool.acquire().await.unwrap();
    let first = client_id(&mut conn).await;
    tokio::time::sleep(Duration::from_millis(800)).await;
    drop(conn);
    let mut conn = pool.acquire().await.unwrap();
    assert_eq!(client_id(&mut conn).await, first);
    drop(conn);

    // left idle longer than the timeout
    tokio::time::sleep(Duration::from_millis(800)).await;
    let mut conn = pool.acquire().await.unwrap();
    assert_ne!(client_id(&mut conn).await, first);
}

#[tokio::test]
async fn test_max_idle_closes_surplus_connections() {
    let Some(config) = test_config() else {
        eprintln!("Skipping test: TEST_REDIS_ADDR not set");
        return;
    };
    let pool = RedisPool::new(Config {
        max_idle: 1,
        max_active: 2,
        ..config
    })
    .unwrap();

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_eq!(pool.status().size, 2);

    pool.release(a);
    pool.release(b);
    let status = pool.status();
    assert_eq!(status.size, 1);
    assert_eq!(status.available, 1);
}
