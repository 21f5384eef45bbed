// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use axum::{routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::day_series_store::DaySeriesStore;
use crate::infrastructure::config::load_settings;
use crate::infrastructure::enlighten_portal::EnlightenPortal;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    array_power, device_series, health_check, list_devices, system_series, totals_series,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let settings = load_settings()?;
    let grid = settings.time_grid()?;

    // Create repository (infrastructure layer)
    let portal = Arc::new(EnlightenPortal::new(
        &settings.base_url,
        settings.persistence.clone(),
    )?);
    if !portal.restore_session().await? {
        match settings.credentials() {
            Some((username, password)) => portal.login(username, password, false).await?,
            None => tracing::warn!(
                "No saved session and no credentials; set ENLIGHTEN_USERNAME and ENLIGHTEN_PASSWORD"
            ),
        }
    }

    // Create store (application layer)
    let state = Arc::new(AppState {
        store: DaySeriesStore::new(portal, grid),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/devices", get(list_devices))
        .route("/days/:date/devices/:id", get(device_series))
        .route("/days/:date/system", get(system_series))
        .route("/days/:date/totals", get(totals_series))
        .route("/power", get(array_power))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = settings.bind_addr.parse()?;
    tracing::info!(
        "Starting enlighten-telemetry on {} (utc_offset={}, time_step={}m)",
        addr,
        settings.utc_offset,
        settings.time_step
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
