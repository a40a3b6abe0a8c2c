/// Gmail and Drive connections
///
/// OAuth tokens for Gmail are held server-side; they are never serialized
/// into API responses. The worker keeps access tokens fresh by refreshing any
/// active connection that expires within the refresh buffer.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Whether a token expiring at `expires_at` should be refreshed now
///
/// A token is due once it is within `buffer` of expiry (inclusive).
pub fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>, buffer: Duration) -> bool {
    expires_at <= now + buffer
}

/// Gmail OAuth connection row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GmailConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub google_email: Option<String>,

    #[serde(skip_serializing, default)]
    pub access_token: String,

    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,

    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tokens obtained from an authorization-code exchange
#[derive(Debug, Clone)]
pub struct UpsertGmailConnection {
    pub user_id: Uuid,
    pub google_email: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

const GMAIL_COLUMNS: &str = "id, user_id, google_email, access_token, refresh_token, \
    expires_at, is_active, created_at, updated_at";

impl GmailConnection {
    /// Inserts or replaces the user's connection and reactivates it
    ///
    /// A missing refresh token keeps the stored one; Google only returns it
    /// on the first consent.
    pub async fn upsert(pool: &PgPool, data: UpsertGmailConnection) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO gmail_connections \
             (user_id, google_email, access_token, refresh_token, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 google_email = COALESCE(EXCLUDED.google_email, gmail_connections.google_email), \
                 access_token = EXCLUDED.access_token, \
                 refresh_token = COALESCE(EXCLUDED.refresh_token, gmail_connections.refresh_token), \
                 expires_at = EXCLUDED.expires_at, \
                 is_active = TRUE, \
                 updated_at = NOW() \
             RETURNING {GMAIL_COLUMNS}"
        );

        sqlx::query_as::<_, GmailConnection>(&sql)
            .bind(data.user_id)
            .bind(data.google_email)
            .bind(data.access_token)
            .bind(data.refresh_token)
            .bind(data.expires_at)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {GMAIL_COLUMNS} FROM gmail_connections WHERE user_id = $1");

        sqlx::query_as::<_, GmailConnection>(&sql)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn deactivate(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE gmail_connections SET is_active = FALSE, updated_at = NOW() \
             WHERE user_id = $1 AND is_active",
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Active connections with a refresh token expiring at or before `cutoff`
    pub async fn due_for_refresh(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {GMAIL_COLUMNS} FROM gmail_connections \
             WHERE is_active AND refresh_token IS NOT NULL AND expires_at <= $1 \
             ORDER BY expires_at ASC"
        );

        sqlx::query_as::<_, GmailConnection>(&sql)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Stores a refreshed access token
    pub async fn store_refreshed(
        pool: &PgPool,
        id: Uuid,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE gmail_connections
            SET access_token = $2,
                refresh_token = COALESCE($3, refresh_token),
                expires_at = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Ids of users with an active Gmail connection
    pub async fn active_user_ids(pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM gmail_connections WHERE is_active")
            .fetch_all(pool)
            .await
    }
}

/// Drive connection row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DriveConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub folder_id: Option<String>,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DriveConnection {
    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, DriveConnection>(
            r#"
            SELECT id, user_id, folder_id, is_active, last_synced_at, created_at
            FROM drive_connections
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Records a completed sync, creating the connection on first use
    pub async fn mark_synced(
        pool: &PgPool,
        user_id: Uuid,
        folder_id: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, DriveConnection>(
            r#"
            INSERT INTO drive_connections (user_id, folder_id, last_synced_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                folder_id = COALESCE(EXCLUDED.folder_id, drive_connections.folder_id),
                is_active = TRUE,
                last_synced_at = NOW()
            RETURNING id, user_id, folder_id, is_active, last_synced_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(folder_id)
        .fetch_one(pool)
        .await
    }

    /// Ids of users with an active Drive connection
    pub async fn active_user_ids(pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM drive_connections WHERE is_active")
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_refresh_boundary() {
        let now = Utc::now();
        let buffer = Duration::minutes(5);

        assert!(needs_refresh(now + Duration::minutes(5), now, buffer));
        assert!(needs_refresh(now - Duration::minutes(1), now, buffer));
        assert!(!needs_refresh(now + Duration::minutes(5) + Duration::seconds(1), now, buffer));
    }

    #[test]
    fn test_tokens_are_not_serialized() {
        let conn = GmailConnection {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            google_email: Some("ada@gmail.com".to_string()),
            access_token: "ya29.secret".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: Utc::now(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&conn).unwrap();
        assert!(!json.contains("ya29.secret"));
        assert!(!json.contains("1//refresh"));
        assert!(json.contains("ada@gmail.com"));
    }
}
