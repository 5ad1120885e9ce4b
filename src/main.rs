//! StudyVault Server
//!
//! A multi-device sync backend for a student productivity app: watermark
//! based pull/push sync with a device registry and audit log, plus CRUD
//! routes over the syncable tables.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studyvault_server::auth::JwtVerifier;
use studyvault_server::config::Config;
use studyvault_server::db;
use studyvault_server::routes;
use studyvault_server::state::AppState;
use studyvault_server::store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "studyvault_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing::info!("Starting StudyVault Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Database: {}", config.database.url);

    // Initialize database and store
    let pool = db::create_pool(&config.database.url).await?;
    tracing::info!("Database initialized");

    let store = Arc::new(SqliteStore::new(pool));
    let verifier = Arc::new(JwtVerifier::new(&config.auth));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Create application state and router
    let state = AppState::new(config, store, verifier);
    let app = routes::app(state);

    // Start server with graceful shutdown
    tracing::info!("StudyVault Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
