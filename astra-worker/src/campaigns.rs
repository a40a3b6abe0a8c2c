/// Scheduled marketing campaign dispatch
///
/// Each poll claims due `scheduled` campaigns (moving them to `sending`)
/// and delivers them with the same code the API uses for "send now".

use astra_shared::campaigns::{deliver_campaign, EmailSender};
use astra_shared::models::marketing_email::MarketingEmail;
use astra_shared::redis::{ChangeOp, ChangePublisher, ChangeTable};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct CampaignDispatcher {
    pool: PgPool,

    /// `None` when email delivery is not configured
    sender: Option<Arc<dyn EmailSender>>,

    changes: ChangePublisher,
    batch_size: i64,
}

impl CampaignDispatcher {
    pub fn new(
        pool: PgPool,
        sender: Option<Arc<dyn EmailSender>>,
        changes: ChangePublisher,
        batch_size: i64,
    ) -> Self {
        Self {
            pool,
            sender,
            changes,
            batch_size: batch_size.max(1),
        }
    }

    /// Delivers every campaign due at `now`, returning how many were handled
    ///
    /// Without an email sender nothing is claimed, so scheduled campaigns
    /// wait until delivery is configured.
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> Result<usize, sqlx::Error> {
        let Some(sender) = &self.sender else {
            tracing::debug!("Email delivery not configured, scheduled campaigns left pending");
            return Ok(0);
        };

        let due = MarketingEmail::claim_due(&self.pool, now, self.batch_size).await?;
        if due.is_empty() {
            return Ok(0);
        }

        tracing::info!(count = due.len(), "Dispatching scheduled campaigns");

        for campaign in &due {
            self.changes
                .publish(ChangeTable::MarketingEmails, ChangeOp::Update, Some(campaign.id))
                .await;

            match deliver_campaign(&self.pool, sender.as_ref(), campaign).await {
                Ok(report) => {
                    tracing::info!(
                        campaign_id = %report.campaign_id,
                        sent = report.sent,
                        failed = report.failed,
                        "Scheduled campaign delivered"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        campaign_id = %campaign.id,
                        error = %e,
                        "Scheduled campaign delivery failed"
                    );
                }
            }

            self.changes
                .publish(ChangeTable::MarketingEmails, ChangeOp::Update, Some(campaign.id))
                .await;
        }

        Ok(due.len())
    }
}
