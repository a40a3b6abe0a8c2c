/// Admin user management
///
/// - `GET /v1/admin/users` - List users
/// - `PATCH /v1/admin/users/:id` - Change role, team or financial access
/// - `DELETE /v1/admin/users/:id` - Delete a user and their content atomically
///
/// Role and team changes reach the user's token on their next refresh.
/// Financial access is read from the database on every document request,
/// so revoking it applies immediately.

use super::double_option;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    models::user::{UpdateUser, User, UserRole},
    redis::{ChangeOp, ChangeTable},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<UserRole>,

    /// `null` removes the user from their team
    #[serde(default, deserialize_with = "double_option")]
    pub team_id: Option<Option<Uuid>>,

    pub can_view_financials: Option<bool>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<User>>> {
    require_admin(&auth)?;
    Ok(Json(User::list_all(&state.db).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    require_admin(&auth)?;

    if id == auth.user_id() && req.role == Some(UserRole::Member) {
        return Err(ApiError::BadRequest("Admins cannot demote themselves".to_string()));
    }

    let update = UpdateUser {
        full_name: None,
        team_id: req.team_id,
        role: req.role,
        can_view_financials: req.can_view_financials,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    let user = User::update(&state.db, id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(
        admin_id = %auth.user_id(),
        user_id = %id,
        role = user.role.as_str(),
        team_id = ?user.team_id,
        can_view_financials = user.can_view_financials,
        "User updated"
    );
    state
        .changes
        .publish(ChangeTable::Users, ChangeOp::Update, Some(id))
        .await;

    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if id == auth.user_id() {
        return Err(ApiError::BadRequest("Admins cannot delete themselves".to_string()));
    }

    if !User::delete_atomic(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(admin_id = %auth.user_id(), user_id = %id, "User deleted");
    state
        .changes
        .publish(ChangeTable::Users, ChangeOp::Delete, Some(id))
        .await;

    Ok(StatusCode::NO_CONTENT)
}
