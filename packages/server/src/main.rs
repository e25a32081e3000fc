use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::config::AppConfig;
use server::consumers;
use server::database::init_db;
use server::notify::Notifier;
use server::pipeline::EventPipeline;
use server::processors::default_registry;
use server::replay::ReplayService;
use server::retry::RetryScheduler;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::load()?;

    let db = init_db(&config.database).await?;
    let mq = Arc::new(mq::init_mq(mq::MqConfig::from(&config.mq)).await?);
    let cache = cache::CacheClient::connect(&config.cache.url).await?;
    let registry = Arc::new(default_registry());
    let notifier = Arc::new(Notifier::with_log_channel());

    let pipeline = EventPipeline::new(
        db.clone(),
        cache.clone(),
        mq.clone(),
        registry.clone(),
        config.clone(),
    );
    let replay = ReplayService::new(db.clone(), mq.clone(), notifier.clone(), config.clone());

    tokio::spawn(consumers::consume_events(
        pipeline.clone(),
        config.mq.events_queue.clone(),
    ));
    tokio::spawn(consumers::consume_retries(
        pipeline.clone(),
        config.mq.retry_queue.clone(),
    ));
    tokio::spawn(consumers::consume_replays(
        db.clone(),
        cache.clone(),
        registry.clone(),
        replay,
        mq.clone(),
        config.mq.replay_queue.clone(),
        config.cache.lock_ttl_secs,
    ));
    tokio::spawn(consumers::consume_dlq_alerts(
        notifier.clone(),
        mq.clone(),
        config.mq.dlq_queue.clone(),
    ));
    tokio::spawn(RetryScheduler::new(cache.clone(), mq.clone(), &config).run_poller());

    let cors = cors_layer(&config);
    let state = AppState {
        db,
        mq,
        cache,
        registry,
        notifier,
        config: config.clone(),
    };
    let app = server::build_router(state).layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = &config.server.cors;
    if cors.allow_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = cors
            .allow_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(Duration::from_secs(cors.max_age))
    }
}
