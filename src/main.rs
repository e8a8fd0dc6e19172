use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crewchat::realtime::{spawn_redis_listener, EventBus};
use crewchat::{config::Config, routes::create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; LOG_DIR adds a daily-rotated file appender.
    let file_layer = std::env::var("LOG_DIR").ok().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, "crewchat.log");
        tracing_subscriber::fmt::layer().with_ansi(false).with_writer(appender)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crewchat=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    // Connect to database
    let pool = crewchat::db::create_pool(&config.database).await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    // Realtime event bus, optionally bridged through Redis so pushes reach
    // every instance.
    let redis_conn = if config.redis.enabled {
        match redis::Client::open(config.redis.url.as_str()) {
            Ok(client) => match redis::aio::ConnectionManager::new(client).await {
                Ok(conn) => Some(conn),
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, events stay instance-local");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Invalid Redis URL, events stay instance-local");
                None
            }
        }
    } else {
        None
    };

    let events = EventBus::new(redis_conn.clone());
    if redis_conn.is_some() {
        spawn_redis_listener(events.clone(), config.redis.url.clone()).await;
    }

    // Create shared state
    let state = crewchat::AppState {
        pool,
        config: config.clone(),
        events,
    };

    // Create router
    let app = create_router(state.clone());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
