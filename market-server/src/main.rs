//! market-server — Zero Waste Marketplace API
//!
//! Long-running service that:
//! - Serves the marketplace REST API (products, orders, payments, reviews)
//! - Authenticates buyers/sellers/admins via JWT
//! - Bridges payments to Stripe and reconciles state via signed webhooks
//! - Tallies environmental-impact metrics per order

mod api;
mod auth;
mod config;
mod db;
mod email;
mod error;
mod money;
mod state;
mod stripe;
mod util;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting market-server (env: {})", config.environment);

    // Initialize application state
    let state = AppState::new(&config).await?;

    // Build router
    let app = api::create_router(state.clone());

    // Periodic rate limiter cleanup (every 5 minutes)
    let rate_limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.cleanup().await;
        }
    });

    // Periodic expiry sweep: flip stale 'active' listings to 'expired'
    // (hourly; listings are also re-derived on every write)
    let sweep_pool = state.pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match db::products::expire_stale(&sweep_pool, shared::util::now_millis()).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(count = n, "Expired stale listings"),
                Err(e) => tracing::error!("Expiry sweep failed: {e}"),
            }
        }
    });

    // Start HTTP server
    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("market-server HTTP listening on {http_addr}");

    axum::serve(
        http_listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
