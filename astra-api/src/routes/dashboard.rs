/// Admin dashboard
///
/// - `GET /v1/admin/dashboard` - Bulk dashboard data: every raw array one
///   render pass needs
/// - `GET /v1/admin/dashboard/summary` - Per-user, per-team and global
///   rollups computed over the same data
///
/// The bulk load runs under a 30-second deadline. When it expires the load
/// is abandoned and the request answers `504 Gateway Timeout`.

use crate::{app::AppState, error::ApiResult};
use astra_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    dashboard::{aggregate, DashboardBundle, DashboardSummary},
    deadline::{Deadline, DASHBOARD_DEADLINE},
};
use axum::{extract::State, Extension, Json};
use chrono::Utc;

async fn load_bundle(state: &AppState) -> ApiResult<DashboardBundle> {
    let bundle = Deadline::new(DASHBOARD_DEADLINE)
        .run("dashboard load", DashboardBundle::load(&state.db))
        .await??;

    tracing::debug!(
        users = bundle.users.len(),
        teams = bundle.teams.len(),
        documents = bundle.documents.len(),
        messages = bundle.chat_messages.len(),
        reports = bundle.reports.len(),
        "Dashboard bundle loaded"
    );

    Ok(bundle)
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DashboardBundle>> {
    require_admin(&auth)?;
    Ok(Json(load_bundle(&state).await?))
}

pub async fn get_summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DashboardSummary>> {
    require_admin(&auth)?;

    let bundle = load_bundle(&state).await?;
    Ok(Json(aggregate(&bundle, Utc::now())))
}
