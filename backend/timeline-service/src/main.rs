use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use timeline_service::cache::TimelineCache;
use timeline_service::handlers::{self, AppState};
use timeline_service::repository::postgres::PostgresStore;
use timeline_service::services::{ActiveUserFilter, PullTimelineService, TimelineService};
use timeline_service::workers::{self, FanoutDispatcher, FanoutPool};
use timeline_service::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.app.log_level.clone())),
        )
        .init();

    info!(
        "Starting timeline-service: env={}, port={}",
        config.app.env, config.app.port
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Database migrations applied");

    let store = Arc::new(PostgresStore::new(pool));
    store.health_check().await?;

    let cache = Arc::new(TimelineCache::new(
        config.cache.feed_page_capacity,
        config.cache.post_capacity,
    ));

    let (bus, rx) = workers::channel(config.fanout.queue_capacity);
    let filter = ActiveUserFilter::new(
        store.clone(),
        config.fanout.active_window_days,
        config.fanout.active_only,
    );
    let dispatcher = Arc::new(FanoutDispatcher::new(
        store.clone(),
        store.clone(),
        store.clone(),
        filter,
    ));
    let _pool_handle = FanoutPool::start(config.fanout.workers, rx, dispatcher);
    info!(
        "Fan-out pool started: {} workers, queue capacity {}",
        config.fanout.workers, config.fanout.queue_capacity
    );

    let timeline = Arc::new(TimelineService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        cache.clone(),
        bus,
    ));
    let pull = Arc::new(PullTimelineService::new(store.clone(), store));
    let state = web::Data::new(AppState {
        timeline,
        pull,
        cache,
    });

    let bind_addr = ("0.0.0.0", config.app.port);
    info!("HTTP server listening on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(bind_addr)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server terminated abnormally")
}
