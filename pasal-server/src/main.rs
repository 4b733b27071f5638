//! pasal-server — Order ledger and checkout service
//!
//! Long-running service that:
//! - Creates and settles customer orders (cash/card direct, Khalti via gateway)
//! - Verifies gateway payments server-side before touching stock
//! - Reconciles abandoned gateway payments in the background
//! - Provides user and admin order APIs (JWT authenticated)

mod api;
mod auth;
mod checkout;
mod config;
mod db;
mod error;
mod gateway;
mod reconcile;
mod state;

use config::Config;
use state::AppState;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pasal_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting pasal-server (env: {})", config.environment);

    // Initialize application state (pool + migrations + gateway client)
    let state = AppState::new(&config).await?;

    // Background settlement reconciler
    reconcile::spawn(
        state.clone(),
        config.reconcile_interval_secs,
        config.reconcile_stale_after_mins,
    );

    let app = api::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("pasal-server HTTP listening on {http_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
