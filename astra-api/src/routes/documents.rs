/// Document metadata
///
/// - `POST /v1/documents` - Record a document
/// - `GET /v1/documents?team_id=` - List documents visible to the caller
///
/// Files themselves are stored elsewhere; only title and folder category
/// live here. The financial folder needs `can_view_financials` or admin,
/// checked against the current user row.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::{
        authorization::{can_view_financials, require_financial_access, require_team_access},
        middleware::AuthContext,
    },
    models::{
        document::{CreateDocument, Document, DocumentCategory},
        user::User,
    },
    redis::{ChangeOp, ChangeTable},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDocumentRequest {
    #[validate(
        length(min = 1, max = 255, message = "Title must be 1-255 characters"),
        custom(function = "crate::routes::not_blank")
    )]
    pub title: String,

    pub category: DocumentCategory,

    /// Defaults to the caller's team
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListDocumentsQuery {
    pub team_id: Option<Uuid>,
}

/// Reloads the caller so team and permission changes apply before the next token refresh
async fn current_user(state: &AppState, auth: &AuthContext) -> ApiResult<(User, AuthContext)> {
    let user = User::find_by_id(&state.db, auth.user_id())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;
    let fresh = AuthContext::new(user.id, user.team_id, user.role);

    Ok((user, fresh))
}

pub async fn create_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    req.validate()?;

    let (user, auth) = current_user(&state, &auth).await?;
    if req.category.is_restricted() {
        require_financial_access(&user)?;
    }

    let team_id = req.team_id.or(user.team_id);
    if let Some(team_id) = team_id {
        require_team_access(&auth, team_id)?;
    }

    let document = Document::create(
        &state.db,
        CreateDocument {
            team_id,
            uploaded_by: Some(user.id),
            title: req.title.trim().to_string(),
            category: req.category,
        },
    )
    .await?;

    tracing::debug!(
        document_id = %document.id,
        category = document.category.as_str(),
        "Document recorded"
    );
    state
        .changes
        .publish(ChangeTable::Documents, ChangeOp::Insert, Some(document.id))
        .await;

    Ok((StatusCode::CREATED, Json(document)))
}

/// Lists a team's documents, or the caller's own uploads when they have no team
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListDocumentsQuery>,
) -> ApiResult<Json<Vec<Document>>> {
    let (user, auth) = current_user(&state, &auth).await?;
    let include_financial = can_view_financials(&user);

    let documents = match query.team_id.or(user.team_id) {
        Some(team_id) => {
            require_team_access(&auth, team_id)?;
            Document::list_by_team(&state.db, team_id, include_financial).await?
        }
        None => Document::list_by_uploader(&state.db, user.id, include_financial).await?,
    };

    Ok(Json(documents))
}
