/// `GET /v1/launch-progress`
///
/// Read-only view of the caller's onboarding checklist. Users who have not
/// started get an empty record rather than a 404.

use crate::{app::AppState, error::ApiResult};
use astra_shared::{auth::middleware::AuthContext, models::launch_progress::LaunchProgress};
use axum::{extract::State, Extension, Json};

pub async fn get_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<LaunchProgress>> {
    let progress = LaunchProgress::find_by_user(&state.db, auth.user_id())
        .await?
        .unwrap_or_else(|| LaunchProgress::empty(auth.user_id()));

    Ok(Json(progress))
}
