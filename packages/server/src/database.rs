use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

use crate::config::DatabaseConfig;

/// Connect to the event store and sync the registered entity schemas.
///
/// Consumers, the retry poller and the HTTP surface all share this pool;
/// it is sized for many short ledger transactions rather than few long ones.
pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(50)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(60))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    db.get_schema_registry("server::entity::*")
        .sync(&db)
        .await?;
    info!("Event store schema synced");

    Ok(db)
}
