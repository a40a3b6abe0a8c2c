/// Chat messages
///
/// Messages are counted per mode on the admin dashboards; their content is
/// never analysed server-side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Chat surface a message was posted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_mode", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageMode {
    /// One-on-one with the assistant
    Private,

    /// Shared team channel
    Team,

    /// Report-building conversation
    Reports,
}

impl MessageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageMode::Private => "private",
            MessageMode::Team => "team",
            MessageMode::Reports => "reports",
        }
    }
}

/// Chat message row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mode: MessageMode,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for posting a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatMessage {
    pub user_id: Uuid,
    pub mode: MessageMode,
    pub content: String,
}

impl ChatMessage {
    pub async fn create(pool: &PgPool, data: CreateChatMessage) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (user_id, mode, content)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, mode, content, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.mode)
        .bind(data.content)
        .fetch_one(pool)
        .await
    }

    /// Lists a user's messages in one mode, oldest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        mode: MessageMode,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, user_id, mode, content, created_at
            FROM (
                SELECT id, user_id, mode, content, created_at
                FROM chat_messages
                WHERE user_id = $1 AND mode = $2
                ORDER BY created_at DESC
                LIMIT $3
            ) recent
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(mode)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Lists the team channel for every member of a team, oldest first
    pub async fn list_team_channel(
        pool: &PgPool,
        team_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, user_id, mode, content, created_at
            FROM (
                SELECT m.id, m.user_id, m.mode, m.content, m.created_at
                FROM chat_messages m
                JOIN users u ON u.id = m.user_id
                WHERE u.team_id = $1 AND m.mode = 'team'
                ORDER BY m.created_at DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC
            "#,
        )
        .bind(team_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChatMessage>(
            "SELECT id, user_id, mode, content, created_at FROM chat_messages",
        )
        .fetch_all(pool)
        .await
    }
}
