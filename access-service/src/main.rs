use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use access_service::{
    build_router,
    config::AccessConfig,
    services::{IapValidator, MemoryStore, RemoteKeySource},
    AppState, Stores,
};
use service_core::observability::logging::init_tracing;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    dotenvy::dotenv().ok();

    // Fail fast on invalid configuration
    let config = AccessConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        session_strategy = ?config.sessions.strategy,
        "Starting access service"
    );

    let stores = Stores::memory(Arc::new(MemoryStore::new()));

    let iap = IapValidator::new(
        config.iap.audience.clone(),
        Arc::new(RemoteKeySource::new(config.iap.jwks_url.clone())),
    );

    let state = AppState::new(config.clone(), stores, Some(iap));

    let cancel = CancellationToken::new();
    let sweeper = state.sessions.spawn_sweeper(
        Duration::from_secs(config.sessions.sweep_interval_seconds),
        cancel.clone(),
    );

    let app = build_router(state);

    let addr = config.common.socket_addr()?;

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Session sweeper did not stop cleanly");
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
