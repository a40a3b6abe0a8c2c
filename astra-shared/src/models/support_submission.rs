/// Support submissions (bug reports, support requests, feature ideas)
///
/// Triage state is two independent axes:
///
/// - `status`: `needs_response ⇄ responded`, toggled by admins
/// - `not_resolved`: a flag admins set or clear at any time
///
/// The queries below never write one axis as a side effect of the other, so a
/// ticket can be `responded` and still `not_resolved`. Responding stores a
/// single `admin_response`; a later response overwrites it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "submission_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubmissionType {
    Bug,
    Support,
    Feature,
}

impl SubmissionType {
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionType::Bug => "Bug report",
            SubmissionType::Support => "Support request",
            SubmissionType::Feature => "Feature request",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "support_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SupportStatus {
    NeedsResponse,
    Responded,
}

impl SupportStatus {
    /// The other status
    pub fn toggled(&self) -> Self {
        match self {
            SupportStatus::NeedsResponse => SupportStatus::Responded,
            SupportStatus::Responded => SupportStatus::NeedsResponse,
        }
    }
}

/// Support submission row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SupportSubmission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub submission_type: SubmissionType,
    pub subject: String,
    pub message: String,
    pub status: SupportStatus,
    pub admin_response: Option<String>,

    /// Admin-only notes; never shown to the submitter
    pub internal_notes: Option<String>,

    pub responded_at: Option<DateTime<Utc>>,
    pub not_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SupportSubmission {
    /// Copy suitable for the submitter: internal notes removed
    pub fn for_submitter(mut self) -> Self {
        self.internal_notes = None;
        self
    }
}

/// Input for filing a ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSupportSubmission {
    pub user_id: Uuid,
    pub submission_type: SubmissionType,
    pub subject: String,
    pub message: String,
}

const SUPPORT_COLUMNS: &str = "id, user_id, submission_type, subject, message, status, \
    admin_response, internal_notes, responded_at, not_resolved, created_at, updated_at";

impl SupportSubmission {
    pub async fn create(
        pool: &PgPool,
        data: CreateSupportSubmission,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO support_submissions (user_id, submission_type, subject, message) \
             VALUES ($1, $2, $3, $4) RETURNING {SUPPORT_COLUMNS}"
        );

        sqlx::query_as::<_, SupportSubmission>(&sql)
            .bind(data.user_id)
            .bind(data.submission_type)
            .bind(data.subject)
            .bind(data.message)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {SUPPORT_COLUMNS} FROM support_submissions WHERE id = $1");

        sqlx::query_as::<_, SupportSubmission>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {SUPPORT_COLUMNS} FROM support_submissions \
             WHERE user_id = $1 ORDER BY created_at DESC"
        );

        sqlx::query_as::<_, SupportSubmission>(&sql)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Lists all tickets, unanswered first, then newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {SUPPORT_COLUMNS} FROM support_submissions \
             ORDER BY (status = 'needs_response') DESC, created_at DESC"
        );

        sqlx::query_as::<_, SupportSubmission>(&sql)
            .fetch_all(pool)
            .await
    }

    /// Records an admin response and marks the ticket responded
    ///
    /// `internal_notes` replaces existing notes only when provided.
    /// `not_resolved` is left as it is.
    pub async fn respond(
        pool: &PgPool,
        id: Uuid,
        response: &str,
        internal_notes: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE support_submissions \
             SET admin_response = $2, \
                 internal_notes = COALESCE($3, internal_notes), \
                 responded_at = NOW(), \
                 status = 'responded', \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {SUPPORT_COLUMNS}"
        );

        sqlx::query_as::<_, SupportSubmission>(&sql)
            .bind(id)
            .bind(response)
            .bind(internal_notes)
            .fetch_optional(pool)
            .await
    }

    /// Sets the status column only
    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        status: SupportStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE support_submissions SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {SUPPORT_COLUMNS}"
        );

        sqlx::query_as::<_, SupportSubmission>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(pool)
            .await
    }

    /// Sets the not-resolved flag only
    pub async fn set_not_resolved(
        pool: &PgPool,
        id: Uuid,
        not_resolved: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE support_submissions SET not_resolved = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {SUPPORT_COLUMNS}"
        );

        sqlx::query_as::<_, SupportSubmission>(&sql)
            .bind(id)
            .bind(not_resolved)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_toggle() {
        assert_eq!(SupportStatus::NeedsResponse.toggled(), SupportStatus::Responded);
        assert_eq!(SupportStatus::Responded.toggled(), SupportStatus::NeedsResponse);
    }

    #[test]
    fn test_status_serde_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&SupportStatus::NeedsResponse).unwrap(),
            "\"needs_response\""
        );
    }

    #[test]
    fn test_for_submitter_strips_internal_notes() {
        let ticket = SupportSubmission {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            submission_type: SubmissionType::Bug,
            subject: "Crash".to_string(),
            message: "It crashed".to_string(),
            status: SupportStatus::Responded,
            admin_response: Some("Fixed".to_string()),
            internal_notes: Some("root cause: null team".to_string()),
            responded_at: Some(Utc::now()),
            not_resolved: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let public = ticket.for_submitter();
        assert!(public.internal_notes.is_none());
        assert_eq!(public.status, SupportStatus::Responded);
        assert!(public.not_resolved);
    }
}
