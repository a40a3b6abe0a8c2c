/// Request authentication
///
/// The API's auth layer calls [`authenticate`] on each protected request and
/// inserts the resulting [`AuthContext`] into request extensions. Handlers
/// receive it with `Extension<AuthContext>` and pass it explicitly to the
/// authorization checks.
///
/// # Example
///
/// ```
/// use axum::http::{header, HeaderMap, HeaderValue};
/// use astra_shared::auth::jwt::{create_token, Claims, TokenType};
/// use astra_shared::auth::middleware::authenticate;
/// use astra_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let secret = "a-secret-that-is-at-least-32-bytes-long";
/// let user_id = Uuid::new_v4();
/// let token = create_token(&Claims::new(user_id, None, UserRole::Member, TokenType::Access), secret).unwrap();
///
/// let mut headers = HeaderMap::new();
/// headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
///
/// let auth = authenticate(&headers, secret).unwrap();
/// assert_eq!(auth.user_id(), user_id);
/// assert!(!auth.is_admin());
/// ```

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use super::jwt::{validate_access_token, Claims, JwtError};
use crate::models::user::UserRole;

/// Identity of the caller for one request
///
/// Read-only; built from validated access-token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    user_id: Uuid,
    team_id: Option<Uuid>,
    role: UserRole,
}

impl AuthContext {
    pub fn new(user_id: Uuid, team_id: Option<Uuid>, role: UserRole) -> Self {
        Self {
            user_id,
            team_id,
            role,
        }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        Self::new(claims.sub, claims.team_id, claims.role)
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn team_id(&self) -> Option<Uuid> {
        self.team_id
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("Expected Bearer token")]
    InvalidFormat,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::Expired,
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

/// Extracts the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidFormat)
}

/// Validates the bearer access token and builds the caller's context
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let claims = validate_access_token(token, secret)?;

    Ok(AuthContext::from_claims(&claims))
}
