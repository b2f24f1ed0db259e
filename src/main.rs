use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use pigeon_localization_service::config::Settings;
use pigeon_localization_service::server::{create_app, AppState};
use pigeon_localization_service::telemetry::init_telemetry;
use pigeon_localization_service::triggers::ResolveRequestConsumer;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Keep the guard alive so pending spans are flushed on exit
    let _telemetry = init_telemetry(&settings.logging, &settings.otel)?;
    tracing::info!(
        store = %settings.store.backend,
        default_locale = %settings.localization.default_locale,
        "Configuration loaded"
    );

    // Create application state
    let state = AppState::initialize(settings.clone()).await?;
    tracing::info!("Application state initialized");

    // Start the resolve request consumer in background
    let consumer_handle = match (&state.redis_pool, settings.consumer.enabled) {
        (Some(pool), true) => {
            let consumer = Arc::new(ResolveRequestConsumer::new(
                settings.consumer.clone(),
                &settings.redis,
                pool.clone(),
                state.message_service.clone(),
                state.publisher.clone(),
                state.shutdown.clone(),
            ));
            Some(tokio::spawn(consumer.run()))
        }
        _ => None,
    };

    let shutdown = state.shutdown.clone();
    let postgres_pool = state.postgres_pool.clone();
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown.clone()))
        .await?;

    // Server errors also end up here; make sure background work stops
    shutdown.cancel();

    if let Some(handle) = consumer_handle {
        tracing::info!("Waiting for the resolve consumer to drain...");
        match tokio::time::timeout(DRAIN_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Resolve consumer task failed"),
            Err(_) => tracing::warn!("Resolve consumer did not drain in time"),
        }
    }

    // Closed after the consumer drains
    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stops pending publish retries and the consumer
    shutdown.cancel();
}
