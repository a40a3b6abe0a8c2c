/// Support tickets
///
/// - `POST /v1/support` - File a ticket
/// - `GET /v1/support` - The caller's tickets (internal notes hidden)
/// - `GET /v1/admin/support` - Every ticket
/// - `POST /v1/admin/support/:id/respond` - Answer a ticket
/// - `PATCH /v1/admin/support/:id/status` - Set `needs_response` / `responded`
/// - `PATCH /v1/admin/support/:id/not-resolved` - Set or clear the flag
///
/// `status` and `not_resolved` are independent: no endpoint writes one as a
/// side effect of the other.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    integrations::email::support_response_email,
    models::{
        support_submission::{
            CreateSupportSubmission, SubmissionType, SupportStatus, SupportSubmission,
        },
        user::User,
    },
    redis::{ChangeOp, ChangeTable},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    pub submission_type: SubmissionType,

    #[validate(
        length(min = 1, max = 200, message = "Subject must be 1-200 characters"),
        custom(function = "crate::routes::not_blank")
    )]
    pub subject: String,

    #[validate(
        length(min = 1, max = 10000, message = "Message must be 1-10000 characters"),
        custom(function = "crate::routes::not_blank")
    )]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RespondRequest {
    #[validate(
        length(min = 1, max = 10000, message = "Response must be 1-10000 characters"),
        custom(function = "crate::routes::not_blank")
    )]
    pub response: String,

    pub internal_notes: Option<String>,

    /// Email the response to the submitter
    #[serde(default)]
    pub notify: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: SupportStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetNotResolvedRequest {
    pub not_resolved: bool,
}

#[derive(Debug, Serialize)]
pub struct RespondResponse {
    pub ticket: SupportSubmission,
    pub email_sent: bool,
}

pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTicketRequest>,
) -> ApiResult<(StatusCode, Json<SupportSubmission>)> {
    req.validate()?;

    let ticket = SupportSubmission::create(
        &state.db,
        CreateSupportSubmission {
            user_id: auth.user_id(),
            submission_type: req.submission_type,
            subject: req.subject.trim().to_string(),
            message: req.message,
        },
    )
    .await?;

    tracing::info!(
        ticket_id = %ticket.id,
        kind = ticket.submission_type.label(),
        "Support ticket filed"
    );
    state
        .changes
        .publish(ChangeTable::SupportSubmissions, ChangeOp::Insert, Some(ticket.id))
        .await;

    Ok((StatusCode::CREATED, Json(ticket.for_submitter())))
}

pub async fn list_my_tickets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<SupportSubmission>>> {
    let tickets = SupportSubmission::list_for_user(&state.db, auth.user_id()).await?;
    Ok(Json(
        tickets
            .into_iter()
            .map(SupportSubmission::for_submitter)
            .collect(),
    ))
}

pub async fn list_all_tickets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<SupportSubmission>>> {
    require_admin(&auth)?;
    Ok(Json(SupportSubmission::list_all(&state.db).await?))
}

/// Records an admin response
///
/// Overwrites any previous response, stamps `responded_at` and sets the
/// status to `responded`. The `not_resolved` flag is left alone. A failed
/// notification email is logged; the response is still saved.
pub async fn respond(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> ApiResult<Json<RespondResponse>> {
    require_admin(&auth)?;
    req.validate()?;

    let notes = req
        .internal_notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let ticket = SupportSubmission::respond(&state.db, id, req.response.trim(), notes)
        .await?
        .ok_or_else(|| ApiError::NotFound("Support ticket not found".to_string()))?;

    tracing::info!(ticket_id = %id, admin_id = %auth.user_id(), "Support ticket answered");
    state
        .changes
        .publish(ChangeTable::SupportSubmissions, ChangeOp::Update, Some(id))
        .await;

    let email_sent = if req.notify {
        notify_submitter(&state, &ticket).await
    } else {
        false
    };

    Ok(Json(RespondResponse { ticket, email_sent }))
}

async fn notify_submitter(state: &AppState, ticket: &SupportSubmission) -> bool {
    let result = async {
        let client = state.email()?;
        let submitter = User::find_by_id(&state.db, ticket.user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Submitter not found".to_string()))?;

        client
            .send(&support_response_email(&submitter.email, ticket))
            .await?;
        Ok::<_, ApiError>(())
    }
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(ticket_id = %ticket.id, error = %e, "Support notification not sent");
            false
        }
    }
}

pub async fn set_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<Json<SupportSubmission>> {
    require_admin(&auth)?;

    let ticket = SupportSubmission::set_status(&state.db, id, req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Support ticket not found".to_string()))?;

    state
        .changes
        .publish(ChangeTable::SupportSubmissions, ChangeOp::Update, Some(id))
        .await;

    Ok(Json(ticket))
}

pub async fn set_not_resolved(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetNotResolvedRequest>,
) -> ApiResult<Json<SupportSubmission>> {
    require_admin(&auth)?;

    let ticket = SupportSubmission::set_not_resolved(&state.db, id, req.not_resolved)
        .await?
        .ok_or_else(|| ApiError::NotFound("Support ticket not found".to_string()))?;

    state
        .changes
        .publish(ChangeTable::SupportSubmissions, ChangeOp::Update, Some(id))
        .await;

    Ok(Json(ticket))
}
