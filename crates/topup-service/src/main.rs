//! Top-up Service - HTTP API for wallet top-ups
//!
//! This is the main entry point for the top-up service.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use topup_service::{create_router, AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,topup=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Top-up Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        ledger_configured = %config.ledger_url.is_some(),
        audit_configured = %config.audit_url.is_some(),
        redis_configured = %config.redis_url.is_some(),
        stripe_configured = %config.stripe_api_key.is_some(),
        rates_base_currency = %config.rates_base_currency,
        "Service configuration loaded"
    );

    // Build app state (connects Redis, loads currencies)
    let listen_addr = config.listen_addr.clone();
    let state = AppState::from_config(config).await?;

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
