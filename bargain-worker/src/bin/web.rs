//! Bargain Web Server - dashboard API.
//!
//! Serves the stored results and offer queue, runs normalization and offer
//! generation on request, and streams dispatch runs as Server-Sent Events.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;

use bargain::store::CredentialStore;
use bargain::web::router;
use bargain::{init_tracing, load_price_table, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        data_dir = %config.data_dir.display(),
        send_mode = ?config.send_mode,
        inter_send_delay_ms = config.inter_send_delay_ms,
        "config_loaded"
    );

    let table = load_price_table(&config)?;
    let credentials = CredentialStore::new(config.credentials_path())
        .load(&config)
        .await?;
    info!(
        user_id = %credentials.user_id,
        has_cookie = credentials.has_cookie(),
        "credentials_loaded"
    );

    let port = config.port;
    let app = router(AppState::new(config, table, credentials));

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
