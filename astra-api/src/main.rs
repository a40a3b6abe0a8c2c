//! # Astra Intelligence API Server
//!
//! HTTP API for the Astra workspace: authentication, team documents and
//! chat, the admin dashboard, invites, support, marketing campaigns,
//! Google integrations and the realtime change feed.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p astra-api
//! ```

use astra_api::{
    app::{build_router, AppState},
    config::Config,
};
use astra_shared::{
    db::{
        migrations::run_migrations,
        pool::{create_pool, DatabaseConfig},
    },
    redis::{ChangePublisher, RedisClient, RedisConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astra_api=debug,astra_shared=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Astra API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig {
        max_connections: config.database.max_connections,
        ..DatabaseConfig::from_url(&config.database.url)
    })
    .await?;

    run_migrations(&pool).await?;

    let redis = match &config.redis_url {
        Some(url) => Some(RedisClient::new(RedisConfig::from_url(url)).await?),
        None => {
            tracing::warn!("REDIS_URL not set, realtime updates disabled");
            None
        }
    };
    let changes = ChangePublisher::new(redis);

    let bind_address = config.bind_address();
    let state = AppState::new(pool.clone(), config, changes)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
