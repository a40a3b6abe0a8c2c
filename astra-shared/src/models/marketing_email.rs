/// Marketing email campaigns
///
/// # Lifecycle
///
/// ```text
/// draft ──schedule──> scheduled ──claimed by worker──> sending ──> sent | failed
///   │                                                    ▲
///   └──────────────────── send now ──────────────────────┘
/// ```
///
/// Content edits are accepted while a campaign is `draft` or `scheduled`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "campaign_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl CampaignStatus {
    pub fn is_editable(&self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Scheduled)
    }
}

/// Who receives a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "recipient_filter", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecipientFilter {
    /// Every registered user
    All,

    /// Only the users listed in `recipient_ids`
    Selected,
}

/// Campaign row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MarketingEmail {
    pub id: Uuid,
    pub subject: String,
    pub html_body: String,

    /// Prompt used to generate the copy, if any
    pub prompt: Option<String>,

    pub status: CampaignStatus,
    pub recipient_filter: RecipientFilter,
    pub recipient_ids: Vec<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub sent_count: i32,
    pub failed_count: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMarketingEmail {
    pub subject: String,
    pub html_body: String,
    pub prompt: Option<String>,
    pub recipient_filter: RecipientFilter,
    pub recipient_ids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
}

/// Partial content update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMarketingEmail {
    pub subject: Option<String>,
    pub html_body: Option<String>,
    pub prompt: Option<Option<String>>,
    pub recipient_filter: Option<RecipientFilter>,
    pub recipient_ids: Option<Vec<Uuid>>,
}

/// Composer state saved by the draft autosave
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContent {
    pub subject: String,
    pub html_body: String,
}

const CAMPAIGN_COLUMNS: &str = "id, subject, html_body, prompt, status, recipient_filter, \
    recipient_ids, scheduled_at, sent_at, sent_count, failed_count, created_by, created_at, updated_at";

impl MarketingEmail {
    pub async fn create(pool: &PgPool, data: CreateMarketingEmail) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO marketing_emails \
             (subject, html_body, prompt, recipient_filter, recipient_ids, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {CAMPAIGN_COLUMNS}"
        );

        sqlx::query_as::<_, MarketingEmail>(&sql)
            .bind(data.subject)
            .bind(data.html_body)
            .bind(data.prompt)
            .bind(data.recipient_filter)
            .bind(data.recipient_ids)
            .bind(data.created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM marketing_emails WHERE id = $1");

        sqlx::query_as::<_, MarketingEmail>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!("SELECT {CAMPAIGN_COLUMNS} FROM marketing_emails ORDER BY created_at DESC");

        sqlx::query_as::<_, MarketingEmail>(&sql).fetch_all(pool).await
    }

    /// Updates content of an editable campaign
    ///
    /// Returns `None` if the campaign does not exist or is no longer editable.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateMarketingEmail,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE marketing_emails SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.subject.is_some() {
            bind_count += 1;
            query.push_str(&format!(", subject = ${bind_count}"));
        }
        if data.html_body.is_some() {
            bind_count += 1;
            query.push_str(&format!(", html_body = ${bind_count}"));
        }
        if data.prompt.is_some() {
            bind_count += 1;
            query.push_str(&format!(", prompt = ${bind_count}"));
        }
        if data.recipient_filter.is_some() {
            bind_count += 1;
            query.push_str(&format!(", recipient_filter = ${bind_count}"));
        }
        if data.recipient_ids.is_some() {
            bind_count += 1;
            query.push_str(&format!(", recipient_ids = ${bind_count}"));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND status IN ('draft', 'scheduled') RETURNING {CAMPAIGN_COLUMNS}"
        ));

        let mut q = sqlx::query_as::<_, MarketingEmail>(&query).bind(id);

        if let Some(subject) = data.subject {
            q = q.bind(subject);
        }
        if let Some(html_body) = data.html_body {
            q = q.bind(html_body);
        }
        if let Some(prompt) = data.prompt {
            q = q.bind(prompt);
        }
        if let Some(filter) = data.recipient_filter {
            q = q.bind(filter);
        }
        if let Some(ids) = data.recipient_ids {
            q = q.bind(ids);
        }

        q.fetch_optional(pool).await
    }

    /// Persists autosaved composer content
    pub async fn save_draft(
        pool: &PgPool,
        id: Uuid,
        draft: &DraftContent,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE marketing_emails
            SET subject = $2, html_body = $3, updated_at = NOW()
            WHERE id = $1 AND status IN ('draft', 'scheduled')
            "#,
        )
        .bind(id)
        .bind(&draft.subject)
        .bind(&draft.html_body)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM marketing_emails WHERE id = $1 AND status IN ('draft', 'scheduled', 'failed')",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Schedules an editable campaign for delivery at `at`
    pub async fn schedule(
        pool: &PgPool,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE marketing_emails \
             SET status = 'scheduled', scheduled_at = $2, updated_at = NOW() \
             WHERE id = $1 AND status IN ('draft', 'scheduled') \
             RETURNING {CAMPAIGN_COLUMNS}"
        );

        sqlx::query_as::<_, MarketingEmail>(&sql)
            .bind(id)
            .bind(at)
            .fetch_optional(pool)
            .await
    }

    /// Moves one editable campaign to `sending` for immediate delivery
    ///
    /// Returns `None` if it is already sending, sent or gone.
    pub async fn begin_sending(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE marketing_emails SET status = 'sending', updated_at = NOW() \
             WHERE id = $1 AND status IN ('draft', 'scheduled', 'failed') \
             RETURNING {CAMPAIGN_COLUMNS}"
        );

        sqlx::query_as::<_, MarketingEmail>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Claims scheduled campaigns whose time has come
    ///
    /// `FOR UPDATE SKIP LOCKED` lets several workers poll without claiming
    /// the same campaign twice.
    pub async fn claim_due(
        pool: &PgPool,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let returning = CAMPAIGN_COLUMNS
            .split(", ")
            .map(|column| format!("marketing_emails.{column}"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            r#"
            WITH due AS (
                SELECT id
                FROM marketing_emails
                WHERE status = 'scheduled' AND scheduled_at <= $1
                ORDER BY scheduled_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE marketing_emails
            SET status = 'sending', updated_at = NOW()
            FROM due
            WHERE marketing_emails.id = due.id
            RETURNING {returning}
            "#
        );

        sqlx::query_as::<_, MarketingEmail>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Moves a campaign stuck in `sending` to `failed`
    ///
    /// Used when delivery errors out before counters are recorded, so the
    /// admin can retry, edit or delete it. Returns `false` if it was not
    /// sending.
    pub async fn mark_failed(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE marketing_emails SET status = 'failed', updated_at = NOW() \
             WHERE id = $1 AND status = 'sending'",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records delivery counters and the final status
    pub async fn finish_delivery(
        pool: &PgPool,
        id: Uuid,
        sent_count: i32,
        failed_count: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        let status = if sent_count == 0 && failed_count > 0 {
            CampaignStatus::Failed
        } else {
            CampaignStatus::Sent
        };

        let sql = format!(
            "UPDATE marketing_emails \
             SET status = $2, sent_count = $3, failed_count = $4, sent_at = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING {CAMPAIGN_COLUMNS}"
        );

        sqlx::query_as::<_, MarketingEmail>(&sql)
            .bind(id)
            .bind(status)
            .bind(sent_count)
            .bind(failed_count)
            .fetch_optional(pool)
            .await
    }
}
