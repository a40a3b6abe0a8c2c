/// Reports
///
/// - `POST /v1/reports` - Create a report, optionally on a schedule
/// - `GET /v1/reports` - The caller's reports

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::middleware::AuthContext,
    models::report::{CreateReport, Report, ScheduleFrequency},
    redis::{ChangeOp, ChangeTable},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReportRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "crate::routes::not_blank")
    )]
    pub title: String,

    /// Omitted means manual; any other tag is a schedule
    #[serde(default = "manual")]
    pub schedule_frequency: ScheduleFrequency,
}

fn manual() -> ScheduleFrequency {
    ScheduleFrequency::Manual
}

const MAX_FREQUENCY_TAG: usize = 20;

/// Report with its decoded frequency
#[derive(Debug, Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,

    pub frequency: ScheduleFrequency,
    pub is_scheduled: bool,
}

impl From<Report> for ReportView {
    fn from(report: Report) -> Self {
        let frequency = report.frequency();
        Self {
            report,
            is_scheduled: frequency.is_scheduled(),
            frequency,
        }
    }
}

pub async fn create_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateReportRequest>,
) -> ApiResult<(StatusCode, Json<ReportView>)> {
    req.validate()?;
    if req.schedule_frequency.as_tag().map_or(0, str::len) > MAX_FREQUENCY_TAG {
        return Err(ApiError::invalid(
            "schedule_frequency",
            "Schedule frequency must be at most 20 characters",
        ));
    }

    let report = Report::create(
        &state.db,
        CreateReport {
            user_id: auth.user_id(),
            title: req.title.trim().to_string(),
            frequency: req.schedule_frequency,
        },
    )
    .await?;

    state
        .changes
        .publish(ChangeTable::Reports, ChangeOp::Insert, Some(report.id))
        .await;

    Ok((StatusCode::CREATED, Json(report.into())))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ReportView>>> {
    let reports = Report::list_for_user(&state.db, auth.user_id()).await?;
    Ok(Json(reports.into_iter().map(ReportView::from).collect()))
}
