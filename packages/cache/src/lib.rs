pub mod error;
pub mod keys;
pub mod lock;
pub mod retry_store;

pub use error::CacheError;
pub use lock::{LockCoordinator, TtlState};
pub use retry_store::RetryStore;

use redis::aio::ConnectionManager;

/// Shared-cache connection, cloned into the lock coordinator and retry
/// store. `ConnectionManager` multiplexes one reconnecting connection.
#[derive(Clone)]
pub struct CacheClient {
    conn: ConnectionManager,
}

impl CacheClient {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn locks(&self) -> LockCoordinator {
        LockCoordinator::new(self.conn.clone())
    }

    pub fn retry_store(&self) -> RetryStore {
        RetryStore::new(self.conn.clone())
    }
}
