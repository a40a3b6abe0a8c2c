//! # Astra Worker
//!
//! Background jobs for Astra Intelligence:
//! - Refreshes Gmail access tokens before they expire
//! - Delivers scheduled marketing campaigns
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p astra-worker
//! ```

use astra_shared::campaigns::EmailSender;
use astra_shared::db::{
    migrations::migration_status,
    pool::{create_pool, DatabaseConfig},
};
use astra_shared::integrations::{email::EmailClient, google::GoogleOAuthClient};
use astra_shared::redis::{ChangePublisher, RedisClient, RedisConfig};
use astra_worker::campaigns::CampaignDispatcher;
use astra_worker::config::WorkerConfig;
use astra_worker::scheduler::{Scheduler, SchedulerConfig};
use astra_worker::token_refresh::TokenRefreshPoller;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astra_worker=debug,astra_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Astra Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(DatabaseConfig {
        max_connections: config.max_connections,
        ..DatabaseConfig::from_url(&config.database_url)
    })
    .await?;

    // The API server owns migrations; the worker only checks them
    let status = migration_status(&pool).await?;
    if !status.is_up_to_date() {
        tracing::warn!(
            applied = status.applied,
            known = status.known,
            "Database schema is behind; start the API server to migrate"
        );
    }

    let redis = match &config.redis_url {
        Some(url) => Some(RedisClient::new(RedisConfig::from_url(url)).await?),
        None => None,
    };
    let changes = ChangePublisher::new(redis);

    let refresh = match config.google.clone() {
        Some(google) => Some(TokenRefreshPoller::new(
            Arc::new(GoogleOAuthClient::new(google)?),
            Arc::new(pool.clone()),
            changes.clone(),
        )),
        None => {
            tracing::warn!("Google OAuth not configured, Gmail token refresh disabled");
            None
        }
    };

    let sender: Option<Arc<dyn EmailSender>> = match config.email.clone() {
        Some(email) => Some(Arc::new(EmailClient::new(email)?)),
        None => {
            tracing::warn!("Email delivery not configured, scheduled campaigns will wait");
            None
        }
    };

    let campaigns = CampaignDispatcher::new(
        pool.clone(),
        sender,
        changes,
        config.campaign_batch_size,
    );

    let scheduler = Scheduler::new(
        refresh,
        campaigns,
        SchedulerConfig {
            token_refresh_interval: config.token_refresh_interval,
            campaign_poll_interval: config.campaign_poll_interval,
        },
    );

    let shutdown = scheduler.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received, finishing current jobs..."),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
        }
        shutdown.cancel();
    });

    tracing::info!("Worker ready");
    scheduler.run().await;

    pool.close().await;
    tracing::info!("Worker stopped");

    Ok(())
}
