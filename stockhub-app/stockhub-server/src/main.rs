use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use stockhub_api::{build_router, AppState};
use stockhub_core::repositories::{InMemoryRateCounter, RateCounter};
use stockhub_infrastructure::{
    create_pool, create_redis_pool, run_migrations, PgEntityStore, PgTenantRepository,
    RedisRateCounter,
};
use stockhub_security::JwtService;
use stockhub_shared::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize telemetry; LOG_DIR adds a daily-rotated JSON file
    let _log_guard = match std::env::var("LOG_DIR") {
        Ok(dir) => Some(stockhub_shared::telemetry::init_telemetry_with_file(Path::new(&dir))?),
        Err(_) => {
            stockhub_shared::telemetry::init_telemetry();
            None
        }
    };

    info!("StockHub server starting...");

    // Load configuration
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Connect to Database
    info!("Connecting to database...");
    let pool = create_pool(&config.database).await?;
    if config.database.run_migrations {
        run_migrations(&pool).await?;
    }
    info!("Database connection established.");

    // Rate counter: shared through Redis when enabled, otherwise per process
    let counter: Arc<dyn RateCounter> = if config.redis.enabled {
        let redis = create_redis_pool(&config.redis)?;
        info!("Rate limiting backed by Redis");
        Arc::new(RedisRateCounter::new(redis))
    } else {
        warn!("Redis disabled, rate limits are counted per instance");
        Arc::new(InMemoryRateCounter::new())
    };

    // Create App State
    let state = AppState::new(
        Arc::new(PgTenantRepository::new(pool.clone())),
        Arc::new(PgEntityStore::new(pool)),
        counter,
        JwtService::new(config.jwt.secret.clone(), config.jwt.access_token_expiry),
        config.tenancy.clone(),
    );

    // Build router
    let app = build_router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::HeaderName::from_static(stockhub_shared::constants::TENANT_HEADER),
            ]),
    );

    // Bind address
    let host: std::net::IpAddr = config.app.host.parse()?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("Listening on {}", addr);

    // Start server; peer addresses feed the audit trail
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
