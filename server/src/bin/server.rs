//! Sorteo server.
//!
//! Binds the HTTP API, seeds the demo raffle, and runs the expiry sweep
//! until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use sorteo_server::{bootstrap, build_router, sweeper, Config};
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sorteo_core=debug,sorteo_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        expiry_hours = config.orders.expiry_hours,
        "configuration loaded"
    );

    let state = bootstrap::build_state(&config).await?;
    let sweep = sweeper::spawn_expiry_sweeper(
        state.orders.clone(),
        Duration::from_secs(config.orders.sweep_interval_secs),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "sorteo server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down gracefully");
        })
        .await?;

    sweep.abort();
    Ok(())
}
