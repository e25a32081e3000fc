use redis::aio::ConnectionManager;
use tracing::debug;

use crate::error::CacheError;

/// Remaining lifetime of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    /// Key exists with this many seconds left.
    Remaining(u64),
    /// Key exists but has no expiry.
    NoExpiry,
    /// Key does not exist.
    Missing,
}

impl TtlState {
    /// Map a Redis TTL reply (-2 missing, -1 no expiry, >= 0 seconds).
    pub fn from_redis(ttl: i64) -> Self {
        match ttl {
            -2 => Self::Missing,
            -1 => Self::NoExpiry,
            secs => Self::Remaining(secs.max(0) as u64),
        }
    }
}

/// Distributed mutual exclusion backed by atomic SET NX EX.
///
/// At most one holder per key per TTL window. If the holder outlives the
/// TTL the lock silently expires and another caller may acquire it; that is
/// an accepted property of the design, not a fault.
#[derive(Clone)]
pub struct LockCoordinator {
    conn: ConnectionManager,
}

impl LockCoordinator {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Returns true iff this caller now holds the lock.
    pub async fn acquire(&self, key: &str, ttl_secs: u64) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("LOCKED")
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    /// Unconditional delete. Releasing a missing key is not an error.
    pub async fn release(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        if deleted > 0 {
            debug!(key, "Lock released");
        } else {
            debug!(key, "Lock already gone");
        }
        Ok(())
    }

    pub async fn remaining_ttl(&self, key: &str) -> Result<TtlState, CacheError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        Ok(TtlState::from_redis(ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_state_mapping() {
        assert_eq!(TtlState::from_redis(-2), TtlState::Missing);
        assert_eq!(TtlState::from_redis(-1), TtlState::NoExpiry);
        assert_eq!(TtlState::from_redis(0), TtlState::Remaining(0));
        assert_eq!(TtlState::from_redis(299), TtlState::Remaining(299));
    }
}
