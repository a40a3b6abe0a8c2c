/// Gmail and Drive integrations
///
/// - `POST /v1/integrations/gmail/exchange` - Trade an OAuth code for tokens
/// - `GET /v1/integrations/gmail` - Connection status
/// - `DELETE /v1/integrations/gmail` - Disconnect
/// - `POST /v1/integrations/drive/sync` - Trigger a Drive sync
///
/// Google tokens never leave the server. The worker keeps access tokens
/// fresh; the API only performs the initial exchange.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::middleware::AuthContext,
    deadline::{Deadline, SYNC_WEBHOOK_DEADLINE},
    integrations::drive::{SyncOutcome, SyncRequest},
    models::integration::{DriveConnection, GmailConnection, UpsertGmailConnection},
    redis::{ChangeOp, ChangeTable},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ExchangeRequest {
    #[validate(
        length(min = 1, message = "Authorization code is required"),
        custom(function = "crate::routes::not_blank")
    )]
    pub code: String,

    #[validate(url(message = "Redirect URI must be a URL"))]
    pub redirect_uri: String,
}

#[derive(Debug, Serialize)]
pub struct GmailStatus {
    pub connected: bool,
    pub google_email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Option<GmailConnection>> for GmailStatus {
    fn from(connection: Option<GmailConnection>) -> Self {
        match connection.filter(|c| c.is_active) {
            Some(c) => Self {
                connected: true,
                google_email: c.google_email,
                expires_at: Some(c.expires_at),
            },
            None => Self {
                connected: false,
                google_email: None,
                expires_at: None,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DriveSyncRequest {
    /// Folder to sync; defaults to the previously synced folder
    pub folder_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DriveSyncResponse {
    #[serde(flatten)]
    pub outcome: SyncOutcome,

    pub synced_at: DateTime<Utc>,
}

/// Completes the Gmail OAuth flow
///
/// # Errors
///
/// - `503 Service Unavailable`: Google OAuth is not configured
/// - `502 Bad Gateway`: Google rejected the code
pub async fn gmail_exchange(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ExchangeRequest>,
) -> ApiResult<Json<GmailStatus>> {
    req.validate()?;
    let google = state.google()?;

    let grant = google.exchange_code(&req.code, &req.redirect_uri).await?;
    let google_email = google.account_email(&grant.access_token).await;

    let connection = GmailConnection::upsert(
        &state.db,
        UpsertGmailConnection {
            user_id: auth.user_id(),
            google_email,
            expires_at: grant.expires_at(Utc::now()),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
        },
    )
    .await?;

    if connection.refresh_token.is_none() {
        tracing::warn!(
            user_id = %auth.user_id(),
            "Gmail connected without a refresh token; it will stop working when the access token expires"
        );
    }

    tracing::info!(user_id = %auth.user_id(), "Gmail connected");
    state
        .changes
        .publish(ChangeTable::GmailConnections, ChangeOp::Update, Some(connection.id))
        .await;

    Ok(Json(Some(connection).into()))
}

pub async fn gmail_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<GmailStatus>> {
    let connection = GmailConnection::find_by_user(&state.db, auth.user_id()).await?;
    Ok(Json(connection.into()))
}

pub async fn gmail_disconnect(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    if !GmailConnection::deactivate(&state.db, auth.user_id()).await? {
        return Err(ApiError::NotFound("Gmail is not connected".to_string()));
    }

    tracing::info!(user_id = %auth.user_id(), "Gmail disconnected");
    state
        .changes
        .publish(ChangeTable::GmailConnections, ChangeOp::Update, None)
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Calls the Drive sync webhook
///
/// The call runs under a 5-minute deadline. On expiry it is abandoned (not
/// retried) and the request answers `504 Gateway Timeout`.
pub async fn drive_sync(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: Option<Json<DriveSyncRequest>>,
) -> ApiResult<Json<DriveSyncResponse>> {
    let drive = state.drive()?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let folder_id = match req.folder_id.filter(|f| !f.trim().is_empty()) {
        Some(folder_id) => Some(folder_id),
        None => DriveConnection::find_by_user(&state.db, auth.user_id())
            .await?
            .and_then(|c| c.folder_id),
    };

    let request = SyncRequest {
        user_id: auth.user_id(),
        folder_id: folder_id.clone(),
        requested_at: Utc::now(),
    };

    let outcome = Deadline::new(SYNC_WEBHOOK_DEADLINE)
        .run("drive sync", drive.trigger(&request))
        .await??;

    let connection =
        DriveConnection::mark_synced(&state.db, auth.user_id(), folder_id.as_deref()).await?;

    tracing::info!(
        user_id = %auth.user_id(),
        files_synced = ?outcome.files_synced,
        "Drive sync finished"
    );
    state
        .changes
        .publish(ChangeTable::DriveConnections, ChangeOp::Update, Some(connection.id))
        .await;

    Ok(Json(DriveSyncResponse {
        outcome,
        synced_at: connection.last_synced_at.unwrap_or_else(Utc::now),
    }))
}
