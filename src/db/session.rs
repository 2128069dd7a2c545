//! Instrumented SQL session.
//!
//! A [`Session`] runs statements on a [`DbPool`] and reports each one to its
//! [`EventReceiver`]: `timing_kv` on success, `event_err_kv` on failure. The
//! error is still returned to the caller.

use crate::db::events::{EventReceiver, Kvs, NullEventReceiver};
use crate::db::pool::DbPool;
use crate::error::{StoreError, StoreResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

const EXEC_EVENT: &str = "session.exec";
const PING_EVENT: &str = "session.ping";

#[derive(Clone)]
pub struct Session {
    pool: DbPool,
    receiver: Arc<dyn EventReceiver>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("pool", &self.pool).finish()
    }
}

impl Session {
    /// Create a session; without a receiver, events are dropped.
    pub fn new(pool: DbPool, receiver: Option<Arc<dyn EventReceiver>>) -> Self {
        Self {
            pool,
            receiver: receiver.unwrap_or_else(|| Arc::new(NullEventReceiver)),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn receiver(&self) -> &dyn EventReceiver {
        self.receiver.as_ref()
    }

    /// Execute a statement and return the number of rows affected.
    pub async fn execute(&self, sql: &str) -> StoreResult<u64> {
        let start = Instant::now();
        let result = crate::impl_db_dispatch!(&self.pool, {
            MySql(p) => sqlx::query(sql).execute(p).await.map(|r| r.rows_affected()),
            Postgres(p) => sqlx::query(sql).execute(p).await.map(|r| r.rows_affected()),
            SQLite(p) => sqlx::query(sql).execute(p).await.map(|r| r.rows_affected()),
        });
        debug!(sql = %sql, elapsed_ms = start.elapsed().as_millis() as u64, "Executed statement");
        self.report(EXEC_EVENT, sql, start, result.map_err(StoreError::from))
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> StoreResult<()> {
        const SQL: &str = "SELECT 1";
        let start = Instant::now();
        let result = crate::impl_db_dispatch!(&self.pool, {
            MySql(p) => sqlx::query(SQL).execute(p).await.map(|_| ()),
            Postgres(p) => sqlx::query(SQL).execute(p).await.map(|_| ()),
            SQLite(p) => sqlx::query(SQL).execute(p).await.map(|_| ()),
        });
        self.report(PING_EVENT, SQL, start, result.map_err(StoreError::from))
    }

    fn report<T>(
        &self,
        name: &str,
        sql: &str,
        start: Instant,
        result: StoreResult<T>,
    ) -> StoreResult<T> {
        let mut kvs = Kvs::new();
        kvs.insert("sql".to_string(), sql.to_string());
        match &result {
            Ok(_) => self.receiver.timing_kv(name, start.elapsed(), &kvs),
            Err(err) => self.receiver.event_err_kv(name, err, &kvs),
        }
        result
    }
}
