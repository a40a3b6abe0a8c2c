/// The caller's own profile
///
/// - `GET /v1/me` - Profile
/// - `PATCH /v1/me` - Edit display name
/// - `POST /v1/me/activity` - Stamp `last_active_at` (drives the 7/30-day windows)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::{authorization::can_view_financials, middleware::AuthContext},
    models::{
        team::Team,
        user::{UpdateUser, User},
    },
    redis::{ChangeOp, ChangeTable},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,

    pub team_name: Option<String>,

    /// Effective financial access (admins always have it)
    pub financial_access: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub full_name: Option<String>,
}

async fn load_me(state: &AppState, auth: &AuthContext) -> ApiResult<MeResponse> {
    let user = User::find_by_id(&state.db, auth.user_id())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let team_name = match user.team_id {
        Some(team_id) => Team::find_by_id(&state.db, team_id).await?.map(|t| t.name),
        None => None,
    };

    Ok(MeResponse {
        financial_access: can_view_financials(&user),
        team_name,
        user,
    })
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    Ok(Json(load_me(&state, &auth).await?))
}

/// Updates the display name; an empty string clears it
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateMeRequest>,
) -> ApiResult<Json<MeResponse>> {
    req.validate()?;

    if let Some(name) = req.full_name {
        let name = name.trim().to_string();
        let update = UpdateUser {
            full_name: Some((!name.is_empty()).then_some(name)),
            ..Default::default()
        };
        User::update(&state.db, auth.user_id(), update).await?;

        state
            .changes
            .publish(ChangeTable::Users, ChangeOp::Update, Some(auth.user_id()))
            .await;
    }

    Ok(Json(load_me(&state, &auth).await?))
}

pub async fn record_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    if !User::touch_activity(&state.db, auth.user_id()).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
