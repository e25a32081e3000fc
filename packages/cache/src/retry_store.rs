use redis::aio::ConnectionManager;

use crate::error::CacheError;
use crate::lock::TtlState;

/// Pending-retry storage that uses key expiry as the delay timer.
///
/// A scheduled retry is a key whose value is the serialized event and whose
/// TTL equals the backoff delay. The scheduler polls the keyspace and
/// republishes entries whose TTL is about to run out, rather than waiting
/// for an expiry notification that could arrive after the value is gone.
#[derive(Clone)]
pub struct RetryStore {
    conn: ConnectionManager,
}

impl RetryStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Store `value` under `key` expiring after `ttl_secs`.
    pub async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// None when the key expired or was deleted between SCAN and GET.
    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    /// Returns true if the key existed.
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(deleted > 0)
    }

    pub async fn remaining_ttl(&self, key: &str) -> Result<TtlState, CacheError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        Ok(TtlState::from_redis(ttl))
    }

    /// Enumerate keys matching a glob pattern with a full SCAN pass.
    pub async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}
