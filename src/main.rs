use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;

use fanout_notification_service::config::Settings;
use fanout_notification_service::server::{create_app, AppState};
use fanout_notification_service::telemetry::init_telemetry;
use fanout_notification_service::triggers::RedisSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!(
        store = %settings.store.backend,
        push_enabled = settings.push.enabled,
        redis_enabled = settings.redis.enabled,
        "Configuration loaded"
    );

    let state = AppState::from_settings(settings.clone()).await?;
    tracing::info!("Application state initialized");

    let redis_subscriber = Arc::new(RedisSubscriber::new(
        settings.redis.clone(),
        state.dispatcher.clone(),
    ));
    let shutdown_signal = redis_subscriber.shutdown_signal();

    let subscriber = redis_subscriber.clone();
    let redis_handle = tokio::spawn(async move {
        if let Err(e) = subscriber.start().await {
            tracing::error!(error = %e, "Redis subscriber failed");
        }
    });

    let postgres_pool = state.postgres_pool.clone();
    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_signal))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    let _ = redis_handle.await;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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

    // Stop the Redis subscriber
    let _ = shutdown_tx.send(());
}
