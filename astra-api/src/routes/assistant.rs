/// In-app help assistant
///
/// - `POST /v1/assistant` - Ask a question, optionally with prior turns

use crate::{app::AppState, error::ApiResult};
use astra_shared::{auth::middleware::AuthContext, integrations::ai::Turn};
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

const ASSISTANT_SYSTEM_PROMPT: &str = "You are the Astra Intelligence help assistant. \
Answer questions about using the Astra workspace: documents, team chat, reports, \
support tickets and integrations. Keep answers short and practical. If you do not \
know the answer, suggest opening a support ticket.";

/// Prior turns kept from the client's history
const MAX_HISTORY: usize = 20;

#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(
        length(min = 1, max = 4000, message = "Message must be 1-4000 characters"),
        custom(function = "crate::routes::not_blank")
    )]
    pub message: String,

    #[serde(default)]
    pub history: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub reply: String,
}

pub async fn ask(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AskRequest>,
) -> ApiResult<Json<AskResponse>> {
    req.validate()?;
    let ai = state.ai()?;

    let skip = req.history.len().saturating_sub(MAX_HISTORY);
    let mut turns: Vec<Turn> = req.history.into_iter().skip(skip).collect();
    turns.push(Turn::user(req.message));

    let reply = ai.generate(Some(ASSISTANT_SYSTEM_PROMPT), &turns).await?;

    tracing::debug!(user_id = %auth.user_id(), turns = turns.len(), "Assistant answered");

    Ok(Json(AskResponse { reply }))
}
