use std::sync::Arc;
use std::time::Duration;

use cache::keys::{RETRY_KEY_PATTERN, retry_key};
use cache::{CacheClient, TtlState};
use common::{EventMessage, RetryDispatch};
use mq::Mq;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::AppError;

/// Schedules delayed re-delivery by writing the event under an expiring
/// cache key, then republishing entries whose TTL has nearly run out.
///
/// The poller fires the retry itself rather than waiting for a keyspace
/// expiry notification, because by the time an expiry notification arrives
/// the value is already gone. A retry is "due" when its TTL is down to one
/// second; the poller republishes the stored event to the retry queue and
/// deletes the key so it fires exactly once.
#[derive(Clone)]
pub struct RetryScheduler {
    cache: CacheClient,
    mq: Arc<Mq>,
    retry_queue: String,
    poll_interval: Duration,
}

impl RetryScheduler {
    pub fn new(cache: CacheClient, mq: Arc<Mq>, config: &AppConfig) -> Self {
        Self {
            cache,
            mq,
            retry_queue: config.mq.retry_queue.clone(),
            poll_interval: Duration::from_secs(config.cache.retry_poll_interval_secs),
        }
    }

    /// Park `event` for `delay`, after which the poller republishes it for
    /// `processor_name`. Rescheduling an already-parked retry overwrites
    /// the previous timer.
    pub async fn schedule(
        &self,
        event: &EventMessage,
        processor_name: &str,
        delay: Duration,
    ) -> Result<(), AppError> {
        let dispatch = RetryDispatch {
            processor_name: processor_name.to_string(),
            event: event.clone(),
        };
        let value = serde_json::to_string(&dispatch)
            .map_err(|e| AppError::Internal(format!("Failed to serialize retry: {e}")))?;

        let key = retry_key(&event.event_id, processor_name);
        let ttl_secs = delay.as_secs().max(1);
        self.cache.retry_store().put(&key, &value, ttl_secs).await?;

        info!(
            event_id = %event.event_id,
            processor = processor_name,
            delay_secs = ttl_secs,
            "Retry scheduled"
        );
        Ok(())
    }

    /// Drop a pending retry. Returns true if a timer was actually pending.
    pub async fn cancel(&self, event_id: &str, processor_name: &str) -> Result<bool, AppError> {
        let key = retry_key(event_id, processor_name);
        let existed = self.cache.retry_store().delete(&key).await?;
        if existed {
            debug!(event_id, processor = processor_name, "Pending retry cancelled");
        }
        Ok(existed)
    }

    /// Poll loop; never returns. Spawn it on its own task.
    pub async fn run_poller(self) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            queue = %self.retry_queue,
            "Starting retry poller"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.fire_due_retries().await {
                error!(error = %e, "Retry poll pass failed");
            }
        }
    }

    /// One poll pass: republish and delete every due retry key.
    async fn fire_due_retries(&self) -> Result<(), AppError> {
        let store = self.cache.retry_store();
        let keys = store.scan_keys(RETRY_KEY_PATTERN).await?;

        for key in keys {
            let due = match store.remaining_ttl(&key).await? {
                TtlState::Remaining(secs) => secs <= 1,
                // A retry key without an expiry should not exist; fire it
                // rather than leave it stuck forever.
                TtlState::NoExpiry => true,
                TtlState::Missing => false,
            };
            if !due {
                continue;
            }

            // The key can expire between TTL check and GET; that retry is
            // lost to the timer race and nothing can be republished.
            let Some(value) = store.get(&key).await? else {
                warn!(key, "Retry key expired before it could be republished");
                continue;
            };

            let dispatch: RetryDispatch = match serde_json::from_str(&value) {
                Ok(d) => d,
                Err(e) => {
                    error!(key, error = %e, "Dropping undecodable retry entry");
                    store.delete(&key).await?;
                    continue;
                }
            };

            self.mq
                .publish(&self.retry_queue, None, &dispatch, None)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to republish retry: {e}")))?;
            store.delete(&key).await?;

            info!(
                event_id = %dispatch.event.event_id,
                processor = %dispatch.processor_name,
                "Retry due, republished"
            );
        }

        Ok(())
    }
}
