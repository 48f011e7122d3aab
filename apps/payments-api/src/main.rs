//! # Boukii Payments API
//!
//! HTTP server for Payrexx webhooks, payment links and refunds.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Payments API Server                              │
//! │                                                                         │
//! │  Payrexx / Front-ends ──► HTTP (8080) ──► Services ──► SQLite          │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                                      Payrexx REST API                   │
//! │                                                                         │
//! │  NotificationDispatcher (background task) ──► Mailer                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use boukii_db::{Database, DbConfig};
use boukii_payrexx::{
    DispatcherConfig, LogMailer, NotificationDispatcher, PayrexxClient, SystemClock,
};
use boukii_payments_api::{build_router, ApiConfig, AppState};

/// Attempts before a notification is left alone.
const MAX_NOTIFICATION_ATTEMPTS: i64 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env, so RUST_LOG can live there)
    let config = ApiConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting Boukii Payments API...");
    info!(
        port = config.http_port,
        database = %config.database_path,
        api_domain = %config.payrexx_api_domain,
        "Configuration loaded"
    );

    // Open database (runs migrations)
    let db = Database::new(DbConfig::new(&config.database_path))
        .await
        .context("Failed to open database")?;

    let gateway = Arc::new(
        PayrexxClient::new(&config.payrexx_api_domain, config.gateway_timeout())
            .context("Failed to build Payrexx client")?,
    );
    let clock = Arc::new(SystemClock);

    // Background mail dispatch
    let (dispatcher, dispatcher_handle) = NotificationDispatcher::new(
        db.clone(),
        Arc::new(LogMailer),
        clock.clone(),
        DispatcherConfig {
            poll_interval: config.outbox_poll_interval(),
            batch_size: config.outbox_batch_size,
            max_attempts: MAX_NOTIFICATION_ATTEMPTS,
            from: config.mail_from.clone(),
        },
    );
    let dispatcher_task = tokio::spawn(dispatcher.run());

    let state = AppState::new(db.clone(), gateway, clock, &config);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(%addr, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher_handle.shutdown().await;
    dispatcher_task.await.ok();
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
