/// Marketing campaign tooling (admin)
///
/// - `GET /v1/admin/marketing-emails` - List campaigns
/// - `POST /v1/admin/marketing-emails` - Create a draft
/// - `GET /v1/admin/marketing-emails/:id` - One campaign
/// - `PUT /v1/admin/marketing-emails/:id` - Edit a draft or scheduled campaign
/// - `DELETE /v1/admin/marketing-emails/:id` - Delete an unsent campaign
/// - `PUT /v1/admin/marketing-emails/:id/draft` - Composer autosave (debounced)
/// - `POST /v1/admin/marketing-emails/generate` - Generate copy with AI
/// - `POST /v1/admin/marketing-emails/:id/schedule` - Schedule delivery
/// - `POST /v1/admin/marketing-emails/:id/send` - Send now
///
/// Campaign lifecycle:
///
/// ```text
/// draft ──schedule──► scheduled ──(worker)──► sending ──► sent | failed
///   └──────────────send now────────────────────┘
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    campaigns::{deliver_campaign, parse_generated_email, GeneratedEmail, CAMPAIGN_SYSTEM_PROMPT},
    integrations::ai::Turn,
    models::marketing_email::{
        CreateMarketingEmail, DraftContent, MarketingEmail, RecipientFilter,
        UpdateMarketingEmail,
    },
    redis::{ChangeOp, ChangeTable},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::double_option;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCampaignRequest {
    #[validate(length(max = 200, message = "Subject must be at most 200 characters"))]
    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub html_body: String,

    pub prompt: Option<String>,

    #[serde(default = "all_users")]
    pub recipient_filter: RecipientFilter,

    #[serde(default)]
    pub recipient_ids: Vec<Uuid>,
}

fn all_users() -> RecipientFilter {
    RecipientFilter::All
}

/// A `selected` audience needs at least one recipient
fn check_recipients(filter: Option<RecipientFilter>, ids: Option<&Vec<Uuid>>) -> ApiResult<()> {
    if filter == Some(RecipientFilter::Selected) && ids.map_or(true, |ids| ids.is_empty()) {
        return Err(ApiError::invalid("recipient_ids", "Select at least one recipient"));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCampaignRequest {
    #[validate(length(max = 200, message = "Subject must be at most 200 characters"))]
    pub subject: Option<String>,

    pub html_body: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub prompt: Option<Option<String>>,

    pub recipient_filter: Option<RecipientFilter>,
    pub recipient_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub html_body: String,
}

#[derive(Debug, Serialize)]
pub struct DraftAccepted {
    pub id: Uuid,

    /// Milliseconds of quiet before the draft is written
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[validate(
        length(min = 1, max = 4000, message = "Prompt must be 1-4000 characters"),
        custom(function = "crate::routes::not_blank")
    )]
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub scheduled_at: DateTime<Utc>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Campaign not found".to_string())
}

/// Tells "gone" apart from "exists but in the wrong state"
async fn missing_or_locked(state: &AppState, id: Uuid, action: &str) -> ApiError {
    match MarketingEmail::find_by_id(&state.db, id).await {
        Ok(Some(campaign)) => ApiError::Conflict(format!(
            "Cannot {action} a campaign that is {}",
            format!("{:?}", campaign.status).to_lowercase()
        )),
        Ok(None) => not_found(),
        Err(e) => e.into(),
    }
}

async fn publish(state: &AppState, op: ChangeOp, id: Uuid) {
    state
        .changes
        .publish(ChangeTable::MarketingEmails, op, Some(id))
        .await;
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<MarketingEmail>>> {
    require_admin(&auth)?;
    Ok(Json(MarketingEmail::list_all(&state.db).await?))
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<MarketingEmail>)> {
    require_admin(&auth)?;
    req.validate()?;
    check_recipients(Some(req.recipient_filter), Some(&req.recipient_ids))?;

    let campaign = MarketingEmail::create(
        &state.db,
        CreateMarketingEmail {
            subject: req.subject,
            html_body: req.html_body,
            prompt: req.prompt,
            recipient_filter: req.recipient_filter,
            recipient_ids: req.recipient_ids,
            created_by: Some(auth.user_id()),
        },
    )
    .await?;

    tracing::info!(campaign_id = %campaign.id, "Campaign draft created");
    publish(&state, ChangeOp::Insert, campaign.id).await;

    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MarketingEmail>> {
    require_admin(&auth)?;

    let campaign = MarketingEmail::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(campaign))
}

/// Edits content or recipients
///
/// # Errors
///
/// - `409 Conflict`: Campaign is sending, sent or failed
pub async fn update_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCampaignRequest>,
) -> ApiResult<Json<MarketingEmail>> {
    require_admin(&auth)?;
    req.validate()?;
    check_recipients(req.recipient_filter, req.recipient_ids.as_ref())?;

    let update = UpdateMarketingEmail {
        subject: req.subject,
        html_body: req.html_body,
        prompt: req.prompt,
        recipient_filter: req.recipient_filter,
        recipient_ids: req.recipient_ids,
    };

    // An explicit edit supersedes any autosave still waiting
    state.drafts.cancel(&id);

    let Some(campaign) = MarketingEmail::update(&state.db, id, update).await? else {
        return Err(missing_or_locked(&state, id, "edit").await);
    };

    publish(&state, ChangeOp::Update, id).await;
    Ok(Json(campaign))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_admin(&auth)?;

    state.drafts.cancel(&id);
    if !MarketingEmail::delete(&state.db, id).await? {
        return Err(missing_or_locked(&state, id, "delete").await);
    }

    tracing::info!(campaign_id = %id, "Campaign deleted");
    publish(&state, ChangeOp::Delete, id).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Composer autosave
///
/// Answers `202 Accepted` immediately. The draft is written once no newer
/// draft for the same campaign has arrived for two seconds; only the last
/// one is kept.
pub async fn save_draft(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<DraftRequest>,
) -> ApiResult<(StatusCode, Json<DraftAccepted>)> {
    require_admin(&auth)?;

    state.drafts.push(
        id,
        DraftContent {
            subject: req.subject,
            html_body: req.html_body,
        },
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DraftAccepted {
            id,
            debounce_ms: state.drafts.delay().as_millis() as u64,
        }),
    ))
}

/// Writes an autosave that is still waiting so the campaign goes out with
/// the latest content
async fn flush_draft(state: &AppState, id: Uuid) -> ApiResult<()> {
    state.drafts.flush(&id).await.map_err(|e| {
        tracing::error!(campaign_id = %id, error = %e, "Failed to write pending draft");
        ApiError::InternalError("Failed to save the latest draft".to_string())
    })?;
    Ok(())
}

/// Generates subject and body from a prompt
pub async fn generate_content(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<GeneratedEmail>> {
    require_admin(&auth)?;
    req.validate()?;

    let ai = state.ai()?;
    let text = ai
        .generate(Some(CAMPAIGN_SYSTEM_PROMPT), &[Turn::user(req.prompt)])
        .await?;

    Ok(Json(parse_generated_email(&text)))
}

pub async fn schedule_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ScheduleRequest>,
) -> ApiResult<Json<MarketingEmail>> {
    require_admin(&auth)?;

    if req.scheduled_at <= Utc::now() {
        return Err(ApiError::invalid(
            "scheduled_at",
            "Scheduled time must be in the future",
        ));
    }

    flush_draft(&state, id).await?;

    let Some(campaign) = MarketingEmail::schedule(&state.db, id, req.scheduled_at).await? else {
        return Err(missing_or_locked(&state, id, "schedule").await);
    };

    tracing::info!(campaign_id = %id, scheduled_at = %req.scheduled_at, "Campaign scheduled");
    publish(&state, ChangeOp::Update, id).await;

    Ok(Json(campaign))
}

/// Sends a campaign now
///
/// Moves it to `sending` and answers `202 Accepted`; delivery continues in
/// the background and the final status arrives over the realtime feed.
///
/// # Errors
///
/// - `503 Service Unavailable`: Email delivery is not configured
/// - `409 Conflict`: Already sending or sent
pub async fn send_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<MarketingEmail>)> {
    require_admin(&auth)?;
    let email = state.email()?;
    flush_draft(&state, id).await?;

    let Some(campaign) = MarketingEmail::begin_sending(&state.db, id).await? else {
        return Err(missing_or_locked(&state, id, "send").await);
    };

    tracing::info!(campaign_id = %id, admin_id = %auth.user_id(), "Campaign send started");
    publish(&state, ChangeOp::Update, id).await;

    let response = campaign.clone();
    tokio::spawn(async move {
        match deliver_campaign(&state.db, email.as_ref(), &campaign).await {
            Ok(report) => {
                tracing::info!(
                    campaign_id = %report.campaign_id,
                    sent = report.sent,
                    failed = report.failed,
                    "Campaign send finished"
                );
            }
            Err(e) => {
                tracing::error!(campaign_id = %campaign.id, error = %e, "Campaign send failed");
            }
        }
        publish(&state, ChangeOp::Update, campaign.id).await;
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selected_recipients_required() {
        assert!(check_recipients(Some(RecipientFilter::Selected), Some(&vec![])).is_err());
        assert!(check_recipients(Some(RecipientFilter::Selected), None).is_err());
        assert!(check_recipients(Some(RecipientFilter::Selected), Some(&vec![Uuid::new_v4()])).is_ok());
        assert!(check_recipients(Some(RecipientFilter::All), Some(&vec![])).is_ok());
        assert!(check_recipients(None, None).is_ok());
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateCampaignRequest = serde_json::from_str(r#"{"subject": "Hello"}"#).unwrap();

        assert_eq!(req.recipient_filter, RecipientFilter::All);
        assert!(req.recipient_ids.is_empty());
        assert!(req.validate().is_ok());
    }
}
