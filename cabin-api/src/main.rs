use anyhow::Context;
use cabin_api::{app, AppState, AuthConfig};
use cabin_booking::RetryPolicy;
use cabin_core::ReservationStore;
use cabin_store::app_config::Config;
use cabin_store::{DbClient, MemoryReservationStore, PgReservationStore};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cabin_api=debug,cabin_booking=debug,cabin_store=info,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Cabin API on port {}", config.server.port);

    let store: Arc<dyn ReservationStore> = if config.database.is_memory() {
        tracing::warn!("Using in-memory store; reservations are lost on restart");
        Arc::new(MemoryReservationStore::new())
    } else {
        let db = DbClient::new(&config.database)
            .await
            .context("Failed to connect to PostgreSQL")?;
        db.migrate().await.context("Failed to run migrations")?;
        Arc::new(PgReservationStore::new(db.pool.clone(), config.database.lock_timeout_ms))
    };

    let retry = RetryPolicy::new(
        config.reservation.max_attempts,
        Duration::from_millis(config.reservation.base_backoff_ms),
    );

    let app_state = AppState::new(
        store,
        retry,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        config.catalog.seat_map_path.clone().map(PathBuf::from),
    );

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
