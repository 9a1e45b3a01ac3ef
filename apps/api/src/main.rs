mod auth;
mod config;
mod db;
mod errors;
mod models;
mod routes;
mod scoring;
mod state;
mod store;
mod theater;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::routes::build_router;
use crate::scoring::{PriceTable, ScoringEngine};
use crate::state::AppState;
use crate::store::PgLedgerStore;
use crate::theater::{DataProtector, DefuscryptBridge, DisabledProtector};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Gongle API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Scoring engine over the Postgres ledger
    let engine = ScoringEngine::new(
        Arc::new(PgLedgerStore::new(db)),
        PriceTable::standard(),
        config.rules.clone(),
    );
    info!(
        "Scoring rules: final page {}, social bonus {:?}, trust client bonus {}",
        config.rules.final_page, config.rules.social, config.rules.rewards.trust_client
    );

    // Theater encryptor (DisabledProtector unless DEFUSCRYPT_BIN points at a binary)
    let protector: Arc<dyn DataProtector> = match &config.defuscrypt_bin {
        Some(bin) => match DefuscryptBridge::new(bin) {
            Ok(bridge) => Arc::new(bridge),
            Err(e) => {
                warn!("Theater encryption disabled: {e}");
                Arc::new(DisabledProtector)
            }
        },
        None => {
            info!("DEFUSCRYPT_BIN not set; theater previews disabled");
            Arc::new(DisabledProtector)
        }
    };

    // Build app state
    let state = AppState {
        engine: Arc::new(engine),
        protector,
        leaderboard: config.leaderboard_options(),
    };

    // Build router
    let app = build_router(state, config.static_dir.as_deref(), config.secure_cookie)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
