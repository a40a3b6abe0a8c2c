/// Document metadata
///
/// File contents live in object storage and are out of reach of this crate.
/// Only ownership and the folder category are tracked here, which is all the
/// dashboards need for counting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Fixed set of document folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "document_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentCategory {
    Strategy,
    Meeting,
    Financial,
    Marketing,
    Other,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 5] = [
        DocumentCategory::Strategy,
        DocumentCategory::Meeting,
        DocumentCategory::Financial,
        DocumentCategory::Marketing,
        DocumentCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Strategy => "strategy",
            DocumentCategory::Meeting => "meeting",
            DocumentCategory::Financial => "financial",
            DocumentCategory::Marketing => "marketing",
            DocumentCategory::Other => "other",
        }
    }

    /// Financial documents are only visible to admins and users with
    /// `can_view_financials`
    pub fn is_restricted(&self) -> bool {
        matches!(self, DocumentCategory::Financial)
    }
}

/// Document row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub team_id: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    pub title: String,
    pub category: DocumentCategory,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocument {
    pub team_id: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    pub title: String,
    pub category: DocumentCategory,
}

impl Document {
    pub async fn create(pool: &PgPool, data: CreateDocument) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (team_id, uploaded_by, title, category)
            VALUES ($1, $2, $3, $4)
            RETURNING id, team_id, uploaded_by, title, category, created_at
            "#,
        )
        .bind(data.team_id)
        .bind(data.uploaded_by)
        .bind(data.title)
        .bind(data.category)
        .fetch_one(pool)
        .await
    }

    /// Lists a team's documents, newest first
    ///
    /// When `include_restricted` is false, financial documents are left out.
    pub async fn list_by_team(
        pool: &PgPool,
        team_id: Uuid,
        include_restricted: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Document>(
            r#"
            SELECT id, team_id, uploaded_by, title, category, created_at
            FROM documents
            WHERE team_id = $1
              AND ($2 OR category <> 'financial')
            ORDER BY created_at DESC
            "#,
        )
        .bind(team_id)
        .bind(include_restricted)
        .fetch_all(pool)
        .await
    }

    /// Lists documents uploaded by a user who has no team
    pub async fn list_by_uploader(
        pool: &PgPool,
        user_id: Uuid,
        include_restricted: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Document>(
            r#"
            SELECT id, team_id, uploaded_by, title, category, created_at
            FROM documents
            WHERE uploaded_by = $1
              AND ($2 OR category <> 'financial')
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(include_restricted)
        .fetch_all(pool)
        .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Document>(
            "SELECT id, team_id, uploaded_by, title, category, created_at FROM documents",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_strings() {
        let names: Vec<&str> = DocumentCategory::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, ["strategy", "meeting", "financial", "marketing", "other"]);
    }

    #[test]
    fn test_only_financial_is_restricted() {
        for category in DocumentCategory::ALL {
            assert_eq!(category.is_restricted(), category == DocumentCategory::Financial);
        }
    }
}
