use serde::Deserialize;

/// App-level MQ configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Redis connection URL for the broker. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Primary intake queue. Default: "events".
    #[serde(default = "default_events_queue")]
    pub events_queue: String,
    /// Scheduler republish target. Default: "event_retry".
    #[serde(default = "default_retry_queue")]
    pub retry_queue: String,
    /// Dead-letter alert fan-out. Default: "event_dlq".
    #[serde(default = "default_dlq_queue")]
    pub dlq_queue: String,
    /// Replay orchestrator fan-out target. Default: "event_replay".
    #[serde(default = "default_replay_queue")]
    pub replay_queue: String,
}

fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_events_queue() -> String {
    "events".into()
}
fn default_retry_queue() -> String {
    "event_retry".into()
}
fn default_dlq_queue() -> String {
    "event_dlq".into()
}
fn default_replay_queue() -> String {
    "event_replay".into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            events_queue: default_events_queue(),
            retry_queue: default_retry_queue(),
            dlq_queue: default_dlq_queue(),
            replay_queue: default_replay_queue(),
        }
    }
}

/// Shared-cache (lock + retry store) configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheAppConfig {
    /// Redis connection URL for locks and retry keys.
    /// Default: "redis://localhost:6379".
    #[serde(default = "default_cache_url")]
    pub url: String,
    /// Processing-lock TTL in seconds. Default: 300.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    /// Retry poller interval in seconds. Default: 1.
    #[serde(default = "default_retry_poll_interval_secs")]
    pub retry_poll_interval_secs: u64,
}

fn default_cache_url() -> String {
    "redis://localhost:6379".into()
}
fn default_lock_ttl_secs() -> u64 {
    300
}
fn default_retry_poll_interval_secs() -> u64 {
    1
}

impl Default for CacheAppConfig {
    fn default() -> Self {
        Self {
            url: default_cache_url(),
            lock_ttl_secs: default_lock_ttl_secs(),
            retry_poll_interval_secs: default_retry_poll_interval_secs(),
        }
    }
}

/// Pipeline and replay tuning.
#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    /// Attempts before an event is quarantined. Default: 3.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    /// Replay fan-out batch size. Default: 100.
    #[serde(default = "default_replay_batch_size")]
    pub replay_batch_size: usize,
    /// Pause between replay batches in milliseconds. Default: 100.
    #[serde(default = "default_replay_batch_pause_ms")]
    pub replay_batch_pause_ms: u64,
}

fn default_max_attempts() -> i32 {
    3
}
fn default_replay_batch_size() -> usize {
    100
}
fn default_replay_batch_pause_ms() -> u64 {
    100
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            replay_batch_size: default_replay_batch_size(),
            replay_batch_pause_ms: default_replay_batch_pause_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let mq = MqAppConfig::default();
        assert_eq!(mq.events_queue, "events");
        assert_eq!(mq.retry_queue, "event_retry");
        assert_eq!(mq.dlq_queue, "event_dlq");
        assert_eq!(mq.replay_queue, "event_replay");

        let cache = CacheAppConfig::default();
        assert_eq!(cache.lock_ttl_secs, 300);
        assert_eq!(cache.retry_poll_interval_secs, 1);

        let processing = ProcessingConfig::default();
        assert_eq!(processing.max_attempts, 3);
        assert_eq!(processing.replay_batch_size, 100);
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let mq: MqAppConfig =
            serde_json::from_str(r#"{"url": "redis://cache:6379"}"#).unwrap();
        assert_eq!(mq.url, "redis://cache:6379");
        assert_eq!(mq.pool_size, 5);
        assert_eq!(mq.events_queue, "events");
    }
}
