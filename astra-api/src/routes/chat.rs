/// Chat messages
///
/// - `POST /v1/chat/messages` - Post a message in a mode
/// - `GET /v1/chat/messages?mode=private&limit=100` - Recent messages, oldest first
///
/// `team` mode shows the whole team channel; `private` and `reports` show
/// only the caller's own messages.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::middleware::AuthContext,
    models::chat_message::{ChatMessage, CreateChatMessage, MessageMode},
    redis::{ChangeOp, ChangeTable},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use validator::Validate;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize, Validate)]
pub struct PostMessageRequest {
    pub mode: MessageMode,

    #[validate(
        length(min = 1, max = 10000, message = "Message must be 1-10000 characters"),
        custom(function = "crate::routes::not_blank")
    )]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    #[serde(default = "default_mode")]
    pub mode: MessageMode,

    pub limit: Option<i64>,
}

fn default_mode() -> MessageMode {
    MessageMode::Private
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    req.validate()?;

    if req.mode == MessageMode::Team && auth.team_id().is_none() {
        return Err(ApiError::BadRequest(
            "Join a team before posting to the team channel".to_string(),
        ));
    }

    let message = ChatMessage::create(
        &state.db,
        CreateChatMessage {
            user_id: auth.user_id(),
            mode: req.mode,
            content: req.content,
        },
    )
    .await?;

    state
        .changes
        .publish(ChangeTable::ChatMessages, ChangeOp::Insert, Some(message.id))
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let messages = match (query.mode, auth.team_id()) {
        (MessageMode::Team, Some(team_id)) => {
            ChatMessage::list_team_channel(&state.db, team_id, limit).await?
        }
        (mode, _) => ChatMessage::list_for_user(&state.db, auth.user_id(), mode, limit).await?,
    };

    Ok(Json(messages))
}
