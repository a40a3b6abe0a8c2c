/// Authentication endpoints
///
/// - `POST /v1/auth/register` - Register a new user
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Exchange a refresh token for a new pair
///
/// Tokens carry the user's team and role. Refresh reloads the user, so an
/// admin's role or team change is picked up on the next refresh.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use astra_shared::{
    auth::{jwt, password},
    models::user::{CreateUser, User, UserRole},
    redis::{ChangeOp, ChangeTable},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair returned by every auth endpoint
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub user_id: Uuid,
    pub team_id: Option<Uuid>,
    pub role: UserRole,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

fn issue_tokens(state: &AppState, user: &User) -> ApiResult<TokenResponse> {
    let access = jwt::Claims::new(user.id, user.team_id, user.role, jwt::TokenType::Access);
    let refresh = jwt::Claims::new(user.id, user.team_id, user.role, jwt::TokenType::Refresh);

    Ok(TokenResponse {
        user_id: user.id,
        team_id: user.team_id,
        role: user.role,
        access_token: jwt::create_token(&access, state.jwt_secret())?,
        refresh_token: jwt::create_token(&refresh, state.jwt_secret())?,
        token_type: "Bearer",
        expires_in: access.expires_in(),
    })
}

/// Registers a new user
///
/// The very first account becomes an admin; everyone after that is a
/// member without a team until an admin assigns one.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `409 Conflict`: Email already exists
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)
        .map_err(|e| ApiError::invalid("password", e))?;

    let password_hash = password::hash_password(&req.password)?;

    let role = if User::count(&state.db).await? == 0 {
        UserRole::Admin
    } else {
        UserRole::Member
    };

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email.trim().to_string(),
            password_hash,
            full_name: req.full_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            team_id: None,
            role,
            can_view_financials: false,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, role = role.as_str(), "User registered");
    state
        .changes
        .publish(ChangeTable::Users, ChangeOp::Insert, Some(user.id))
        .await;

    Ok((StatusCode::CREATED, Json(issue_tokens(&state, &user)?)))
}

/// Authenticates with email and password
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password (same message)
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(invalid());
    }

    User::touch_sign_in(&state.db, user.id).await?;

    Ok(Json(issue_tokens(&state, &user)?))
}

/// Exchanges a refresh token for a fresh token pair
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token, or the user is gone
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    Ok(Json(issue_tokens(&state, &user)?))
}
