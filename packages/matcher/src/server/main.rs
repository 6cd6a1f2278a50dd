// Main entry point for the matching service

use anyhow::{Context, Result};
use matcher_core::kernel::MatcherService;
use matcher_core::server::build_app;
use matcher_core::MatcherConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,matcher_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting need-to-responder matching service");

    // Load configuration
    let config = MatcherConfig::from_env().context("Failed to load configuration")?;
    tracing::info!(
        initial_radius_km = config.initial_radius_km,
        max_radius_km = config.max_radius_km,
        confirm_timeout_secs = config.confirm_timeout.as_secs(),
        "Configuration loaded"
    );

    // Build the service (spawns the rematch scheduler) and the router
    let service = MatcherService::new(config.clone());
    let app = build_app(service);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!(
        "Assignment stream: http://localhost:{}/api/assignments/stream",
        config.port
    );
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
