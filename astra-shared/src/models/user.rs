/// User model and database operations
///
/// Users belong to at most one team and carry a role (`admin` or `member`)
/// plus a flag controlling visibility of financial documents.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email CITEXT NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     full_name VARCHAR(255),
///     team_id UUID REFERENCES teams(id) ON DELETE SET NULL,
///     role user_role NOT NULL DEFAULT 'member',
///     can_view_financials BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_sign_in_at TIMESTAMPTZ,
///     last_active_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use astra_shared::models::user::{User, CreateUser, UserRole};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     email: "ada@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     full_name: Some("Ada".to_string()),
///     team_id: None,
///     role: UserRole::Member,
///     can_view_financials: false,
/// }).await?;
///
/// User::touch_activity(&pool, user.id).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// `email` is CITEXT in the table and read back as plain text
const USER_COLUMNS: &str = "id, email::text AS email, password_hash, full_name, team_id, role, \
    can_view_financials, created_at, updated_at, last_sign_in_at, last_active_at";

/// Application role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access to admin dashboards, invites, support triage and campaigns
    Admin,

    /// Regular team member
    Member,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Member => "member",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// User account row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Email address (case-insensitive via CITEXT)
    pub email: String,

    /// Argon2id hash. Never leaves the server.
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub full_name: Option<String>,

    /// Team membership; `None` renders as "No Team" on dashboards
    pub team_id: Option<Uuid>,

    pub role: UserRole,

    /// Whether the user may see documents in the financial folder
    pub can_view_financials: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,

    /// Last time the client reported activity; drives the 7/30-day windows
    pub last_active_at: Option<DateTime<Utc>>,
}

/// Input for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub team_id: Option<Uuid>,
    pub role: UserRole,
    pub can_view_financials: bool,
}

/// Partial update of a user
///
/// `None` leaves a field untouched. For nullable columns, `Some(None)` clears
/// the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub full_name: Option<Option<String>>,
    pub team_id: Option<Option<Uuid>>,
    pub role: Option<UserRole>,
    pub can_view_financials: Option<bool>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.team_id.is_none()
            && self.role.is_none()
            && self.can_view_financials.is_none()
    }
}

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Fails on a duplicate email (unique constraint) or an unknown team id.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, full_name, team_id, role, can_view_financials) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.full_name)
            .bind(data.team_id)
            .bind(data.role)
            .bind(data.can_view_financials)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1::citext");

        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Lists every user, oldest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");

        sqlx::query_as::<_, User>(&sql).fetch_all(pool).await
    }

    /// Lists users with the given ids
    pub async fn list_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1) ORDER BY created_at ASC");

        sqlx::query_as::<_, User>(&sql)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Applies a partial update
    ///
    /// Returns `None` when the user does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.full_name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", full_name = ${bind_count}"));
        }
        if data.team_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", team_id = ${bind_count}"));
        }
        if data.role.is_some() {
            bind_count += 1;
            query.push_str(&format!(", role = ${bind_count}"));
        }
        if data.can_view_financials.is_some() {
            bind_count += 1;
            query.push_str(&format!(", can_view_financials = ${bind_count}"));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(full_name) = data.full_name {
            q = q.bind(full_name);
        }
        if let Some(team_id) = data.team_id {
            q = q.bind(team_id);
        }
        if let Some(role) = data.role {
            q = q.bind(role);
        }
        if let Some(can_view) = data.can_view_financials {
            q = q.bind(can_view);
        }

        q.fetch_optional(pool).await
    }

    /// Stamps `last_sign_in_at` after a successful login
    pub async fn touch_sign_in(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET last_sign_in_at = NOW(), last_active_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamps `last_active_at`
    pub async fn touch_activity(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_active_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a user and everything they own in one transaction
    ///
    /// Content rows are removed explicitly so the deletion either fully
    /// happens or leaves nothing behind. Invites and campaigns the user
    /// created are kept with their creator cleared.
    ///
    /// Returns `false` if the user did not exist.
    pub async fn delete_atomic(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        for statement in [
            "DELETE FROM chat_messages WHERE user_id = $1",
            "DELETE FROM reports WHERE user_id = $1",
            "DELETE FROM support_submissions WHERE user_id = $1",
            "DELETE FROM gmail_connections WHERE user_id = $1",
            "DELETE FROM drive_connections WHERE user_id = $1",
            "DELETE FROM launch_progress WHERE user_id = $1",
            "UPDATE documents SET uploaded_by = NULL WHERE uploaded_by = $1",
            "UPDATE invite_codes SET created_by = NULL WHERE created_by = $1",
            "UPDATE marketing_emails SET created_by = NULL WHERE created_by = $1",
        ] {
            sqlx::query(statement).bind(id).execute(&mut *tx).await?;
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }
}
