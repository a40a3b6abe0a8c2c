/// Invite code issuance (admin)
///
/// - `POST /v1/admin/invites` - Issue a code, optionally emailing it
/// - `GET /v1/admin/invites` - List codes with their derived state
/// - `PATCH /v1/admin/invites/:id` - Deactivate or reactivate a code
///
/// Codes are 8 random characters from `[A-Z0-9]`. Uniqueness is left to the
/// database: a collision answers `409` asking the admin to try again, and
/// nothing is retried server-side.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::{authorization::require_admin, middleware::AuthContext},
    integrations::email::invite_email,
    models::{
        invite_code::{generate_invite_code, CreateInviteCode, InviteCode, InviteState},
        user::UserRole,
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
pub struct CreateInviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default = "member")]
    pub role: UserRole,

    /// `None` means the invitee starts a new team
    pub team_id: Option<Uuid>,

    #[serde(default)]
    pub can_view_financials: bool,

    #[serde(default = "one")]
    #[validate(range(min = 1, max = 1000, message = "Max uses must be between 1 and 1000"))]
    pub max_uses: i32,

    /// Also send the invite through the email provider
    #[serde(default)]
    pub send_email: bool,
}

fn member() -> UserRole {
    UserRole::Member
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateInviteRequest {
    pub is_active: bool,
}

/// Invite code with its derived state
#[derive(Debug, Serialize)]
pub struct InviteView {
    #[serde(flatten)]
    pub invite: InviteCode,

    pub state: InviteState,
    pub remaining_uses: i32,
}

impl From<InviteCode> for InviteView {
    fn from(invite: InviteCode) -> Self {
        Self {
            state: invite.state(),
            remaining_uses: invite.remaining_uses(),
            invite,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateInviteResponse {
    pub invite: InviteView,

    /// Ready-to-paste text for sharing the code by hand
    pub share_message: String,

    pub email_sent: bool,

    /// Why the email was not sent, when it was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_error: Option<String>,
}

/// Issues an invite code
///
/// The code is stored first. A failed email does not undo it; the response
/// reports the failure so the admin can share the code by hand.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
/// - `409 Conflict`: Generated code already exists; try again
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateInviteRequest>,
) -> ApiResult<(StatusCode, Json<CreateInviteResponse>)> {
    require_admin(&auth)?;
    req.validate()?;

    let invite = InviteCode::create(
        &state.db,
        CreateInviteCode {
            code: generate_invite_code(),
            email: req.email.trim().to_lowercase(),
            team_id: req.team_id,
            role: req.role,
            can_view_financials: req.can_view_financials,
            max_uses: req.max_uses,
            created_by: Some(auth.user_id()),
        },
    )
    .await?;

    tracing::info!(
        invite_id = %invite.id,
        admin_id = %auth.user_id(),
        role = invite.role.as_str(),
        max_uses = invite.max_uses,
        "Invite code issued"
    );
    state
        .changes
        .publish(ChangeTable::InviteCodes, ChangeOp::Insert, Some(invite.id))
        .await;

    let app_url = &state.config.api.app_url;
    let (email_sent, email_error) = if req.send_email {
        match state.email() {
            Ok(client) => match client.send(&invite_email(&invite, app_url)).await {
                Ok(_) => (true, None),
                Err(e) => {
                    tracing::warn!(invite_id = %invite.id, error = %e, "Invite email failed");
                    (false, Some(e.to_string()))
                }
            },
            Err(e) => (false, Some(e.to_string())),
        }
    } else {
        (false, None)
    };

    let share_message = invite.share_message(app_url);

    Ok((
        StatusCode::CREATED,
        Json(CreateInviteResponse {
            invite: invite.into(),
            share_message,
            email_sent,
            email_error,
        }),
    ))
}

pub async fn list_invites(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<InviteView>>> {
    require_admin(&auth)?;

    let invites = InviteCode::list_all(&state.db).await?;
    Ok(Json(invites.into_iter().map(InviteView::from).collect()))
}

pub async fn update_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateInviteRequest>,
) -> ApiResult<Json<InviteView>> {
    require_admin(&auth)?;

    let invite = InviteCode::set_active(&state.db, id, req.is_active)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invite code not found".to_string()))?;

    tracing::info!(invite_id = %id, is_active = req.is_active, "Invite code toggled");
    state
        .changes
        .publish(ChangeTable::InviteCodes, ChangeOp::Update, Some(id))
        .await;

    Ok(Json(invite.into()))
}
