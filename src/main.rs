//! Intrusion Detector server binary

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intrusion_detector::cache::RedisCache;
use intrusion_detector::service::{DecisionService, PostgresHistory};
use intrusion_detector::{config, create_router, db, ml, AppState};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intrusion_detector=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();
    if let Err(e) = config.validate() {
        panic!("Invalid configuration: {e}");
    }

    tracing::info!("Intrusion Detector starting...");
    tracing::info!(
        "Database: {}",
        config.database_url.split('@').last().unwrap_or("***")
    );

    // Initialize database pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    // Load serving artifacts. A server without a model cannot make
    // decisions, so a missing artifact is fatal at startup.
    let ml_context = ml::load_ml_context(&config)
        .await
        .expect("Failed to load model artifacts; run the `train` binary first");

    // Response cache
    let cache = Arc::new(
        RedisCache::new(&config.redis_url, config.cache_ttl_secs)
            .expect("Failed to create Redis client"),
    );

    let service = Arc::new(DecisionService::new(
        Some(Arc::new(ml_context)),
        cache.clone(),
        Arc::new(PostgresHistory::new(pool.clone())),
    ));

    // Build application state
    let state = AppState {
        pool,
        config: config.clone(),
        service,
        cache,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    axum::serve(listener, app).await.expect("Server error");
}
