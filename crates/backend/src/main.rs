use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use support_relay::{
    auth::provider::GoogleProvider,
    config::AppConfig,
    db,
    relay::IntercomClient,
    repository::{PgSessionStore, PgUserStore},
    routes, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "support_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Both reqwest and the Postgres TLS connector link rustls; pick ring once.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = AppConfig::from_env()?;

    let pool = db::establish_connection_pool(&config.database_url, config.database_pool_size)?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let users = Arc::new(PgUserStore::new(pool.clone()));
    let sessions = Arc::new(PgSessionStore::new(pool));
    let identity = Arc::new(GoogleProvider::new(http.clone(), &config.auth));
    let messaging = Arc::new(IntercomClient::new(http, config.intercom.clone()));

    let state = AppState::new(config.auth.clone(), users, sessions, identity, messaging);

    match state.sessions.purge_expired().await {
        Ok(removed) => tracing::info!("Purged {} expired sessions", removed),
        Err(e) => tracing::warn!("Failed to purge expired sessions: {}", e),
    }

    let app = routes::build_router(state, config.cors_allowed_origins.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
