/// Team endpoints
///
/// - `GET /v1/teams` - List teams
/// - `POST /v1/teams` - Create a team (admin)
/// - `GET /v1/teams/:id` - One team (its members or an admin)
/// - `DELETE /v1/teams/:id` - Delete a team (admin); members fall back to "No Team"

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::{
        authorization::{require_admin, require_team_access},
        middleware::AuthContext,
    },
    models::team::{CreateTeam, Team},
    redis::{ChangeOp, ChangeTable},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "crate::routes::not_blank")
    )]
    pub name: String,
}

pub async fn list_teams(State(state): State<AppState>) -> ApiResult<Json<Vec<Team>>> {
    Ok(Json(Team::list_all(&state.db).await?))
}

pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    require_admin(&auth)?;
    req.validate()?;

    let team = Team::create(
        &state.db,
        CreateTeam {
            name: req.name.trim().to_string(),
        },
    )
    .await?;

    tracing::info!(team_id = %team.id, name = %team.name, "Team created");
    state
        .changes
        .publish(ChangeTable::Teams, ChangeOp::Insert, Some(team.id))
        .await;

    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn get_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Team>> {
    require_team_access(&auth, id)?;

    let team = Team::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team not found".to_string()))?;

    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    if !Team::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Team not found".to_string()));
    }

    tracing::info!(team_id = %id, "Team deleted");
    state
        .changes
        .publish(ChangeTable::Teams, ChangeOp::Delete, Some(id))
        .await;

    Ok(StatusCode::NO_CONTENT)
}
