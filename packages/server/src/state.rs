use std::sync::Arc;

use cache::CacheClient;
use mq::Mq;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::notify::Notifier;
use crate::processors::ProcessorRegistry;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub mq: Arc<Mq>,
    pub cache: CacheClient,
    pub registry: Arc<ProcessorRegistry>,
    pub notifier: Arc<Notifier>,
    pub config: AppConfig,
}
