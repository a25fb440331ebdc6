//! chat-hub server entry point.
//!
//! Starts the hub control loop and the Axum HTTP server exposing the
//! WebSocket room endpoint.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use chat_hub::api;
use chat_hub::app_state::AppState;
use chat_hub::config::{HubConfig, LogFormat};
use chat_hub::hub::{Hub, HubHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = HubConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Plain => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting chat-hub");

    // Start the hub
    let (hub, hub_task) = Hub::spawn(config.hub_settings(), config.trace_mode.build());

    // Build application state and router
    let app = api::build_app(AppState {
        hub: hub.clone(),
        adapter_settings: config.adapter_settings(),
    });

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub))
        .await
        .context("serving http")?;

    hub_task.await.context("hub loop panicked")?;
    tracing::info!("chat-hub stopped");
    Ok(())
}

/// Resolves on Ctrl-C after asking the hub to release every client.
async fn shutdown_signal(hub: HubHandle) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
    hub.shutdown().await;
}
