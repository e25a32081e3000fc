use broccoli_queue::queue::BroccoliQueueBuilder;
pub use broccoli_queue::{
    brokers::broker::BrokerMessage,
    error::BroccoliError,
    queue::{BroccoliQueue, ConsumeOptions},
};

use common::config::MqAppConfig;

use crate::error::MqError;

pub type MqQueue = BroccoliQueue;
pub type MqBuilder = BroccoliQueueBuilder;

/// Connection settings for the Redis-backed broker.
pub struct MqConfig {
    pub url: String,
    pub pool_size: u8,
}

impl From<&MqAppConfig> for MqConfig {
    fn from(app: &MqAppConfig) -> Self {
        Self {
            url: app.url.clone(),
            pool_size: app.pool_size,
        }
    }
}

pub async fn init_mq(config: MqConfig) -> Result<MqQueue, MqError> {
    BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
        .map_err(MqError::from)
}
