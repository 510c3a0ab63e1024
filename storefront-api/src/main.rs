//! # Storefront API Server
//!
//! JSON API for a small multi-seller storefront: accounts, categories,
//! owner-managed products and an anonymous public catalog.
//!
//! ## Startup
//!
//! 1. Load configuration from the environment (`.env` honoured)
//! 2. Connect to PostgreSQL and apply pending migrations
//! 3. Serve until Ctrl-C, then drain in-flight requests
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/storefront JWT_SECRET=... cargo run -p storefront-api
//! ```

use std::net::SocketAddr;

use anyhow::Context;
use storefront_api::{app, config::Config, middleware::rate_limit};
use storefront_shared::db::{
    migrations::run_migrations,
    pool::{self, create_pool},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storefront_api=debug,storefront_shared=info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(
        "Storefront API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let db = create_pool(pool::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await
    .context("Failed to connect to the database")?;

    run_migrations(&db).await.context("Failed to run migrations")?;

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;

    let state = app::AppState::new(db.clone(), config);
    let eviction = rate_limit::spawn_eviction(state.auth_limiter.clone());
    let router = app::build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    eviction.abort();
    pool::close_pool(db).await;
    tracing::info!("Server stopped");

    Ok(())
}
