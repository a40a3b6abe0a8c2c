/// Periodic job scheduler
///
/// Runs the token refresh poller and the campaign dispatcher on their own
/// fixed periods until the shutdown token is cancelled.
///
/// ```text
/// Scheduler
///   ├─> every TOKEN_REFRESH_INTERVAL: TokenRefreshPoller::check
///   └─> every CAMPAIGN_POLL_INTERVAL: CampaignDispatcher::dispatch_due
/// ```
///
/// A failed tick is logged and the loop carries on; only shutdown stops it.

use crate::campaigns::CampaignDispatcher;
use crate::token_refresh::{RefreshOutcome, TokenRefreshPoller};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub token_refresh_interval: Duration,
    pub campaign_poll_interval: Duration,
}

pub struct Scheduler {
    refresh: Option<TokenRefreshPoller>,
    campaigns: CampaignDispatcher,
    config: SchedulerConfig,
    shutdown_token: CancellationToken,
}

impl Scheduler {
    pub fn new(
        refresh: Option<TokenRefreshPoller>,
        campaigns: CampaignDispatcher,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            refresh,
            campaigns,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Used to signal graceful shutdown from external handlers
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub async fn run(self) {
        tracing::info!(
            token_refresh_secs = self.config.token_refresh_interval.as_secs(),
            campaign_poll_secs = self.config.campaign_poll_interval.as_secs(),
            token_refresh_enabled = self.refresh.is_some(),
            "Scheduler starting"
        );

        let refresh_loop = async {
            let Some(poller) = &self.refresh else {
                return;
            };
            run_periodic(
                "token refresh",
                self.config.token_refresh_interval,
                self.shutdown_token.clone(),
                move || async move {
                    match poller.check(Utc::now()).await {
                        Ok(RefreshOutcome::Skipped) => {
                            tracing::debug!("Previous token refresh still running");
                        }
                        Ok(RefreshOutcome::Completed { .. }) => {}
                        Err(e) => tracing::error!(error = %e, "Token refresh check failed"),
                    }
                },
            )
            .await;
        };

        let campaigns = &self.campaigns;
        let campaign_loop = run_periodic(
            "campaign dispatch",
            self.config.campaign_poll_interval,
            self.shutdown_token.clone(),
            move || async move {
                if let Err(e) = campaigns.dispatch_due(Utc::now()).await {
                    tracing::error!(error = %e, "Campaign dispatch failed");
                }
            },
        );

        tokio::join!(refresh_loop, campaign_loop);

        tracing::info!("Scheduler shut down");
    }
}

/// Runs `job` immediately and then once per `period` until `shutdown`
///
/// Shutdown wins over a pending tick. A job in progress is finished before
/// shutdown is observed. Missed ticks are skipped rather than bunched up.
pub async fn run_periodic<F, Fut>(
    label: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                tracing::debug!(job = label, "Periodic job stopping");
                break;
            }
            _ = ticker.tick() => {
                tracing::trace!(job = label, "Periodic job tick");
                job().await;
            }
        }
    }
}
