use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gateway_core::cache::RedisCache;
use gateway_core::collaborators::CollaboratorRegistry;
use gateway_core::config::Config;
use gateway_core::events::KafkaEventPublisher;
use gateway_core::ledger::LedgerService;
use gateway_core::middleware::auth::AuthVerifier;
use gateway_core::{create_app, db, metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gateway_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::create_pool(&config).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("database migrations completed");

    let cache = RedisCache::new(&config.redis_url)?;
    let events = KafkaEventPublisher::new(&config.kafka_brokers, config.event_topic.clone())?;
    let collaborators = CollaboratorRegistry::from_config(&config);
    let auth = AuthVerifier::new(
        &config.jwt_secret,
        config.auth_service_url.clone(),
        Duration::from_secs(config.collaborator_timeout_secs),
    );

    let metrics_handle = metrics::init_metrics()
        .map_err(|e| anyhow::anyhow!("failed to initialize metrics: {}", e))?;

    let state = AppState {
        db: pool.clone(),
        ledger: LedgerService::new(pool.clone()),
        cache: Arc::new(cache),
        events: Arc::new(events),
        collaborators,
        auth,
        metrics_handle,
        service_name: config.service_name.clone(),
        start_time: Instant::now(),
    };

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutting down");
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down gracefully");
        },
    }
}
