/// JWT access and refresh tokens
///
/// Tokens are HS256-signed and carry the user's team and role so that
/// request handling can authorize without a database round trip. Role and
/// team changes take effect on the next token refresh.
///
/// - **Access token**: 24 hours, sent as `Authorization: Bearer <token>`
/// - **Refresh token**: 30 days, exchanged at `/v1/auth/refresh`
///
/// # Example
///
/// ```
/// use astra_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use astra_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-that-is-at-least-32-bytes-long";
/// let claims = Claims::new(Uuid::new_v4(), None, UserRole::Member, TokenType::Access);
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_access_token(&token, secret)?;
/// assert_eq!(validated.role, UserRole::Member);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// Issuer claim on every token
pub const ISSUER: &str = "astra";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    Create(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Expected {expected} token, got {actual}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn lifetime(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    /// Team at issue time
    pub team_id: Option<Uuid>,

    /// Role at issue time
    pub role: UserRole,

    pub token_type: TokenType,
}

impl Claims {
    pub fn new(user_id: Uuid, team_id: Option<Uuid>, role: UserRole, token_type: TokenType) -> Self {
        Self::with_lifetime(user_id, team_id, role, token_type, token_type.lifetime())
    }

    pub fn with_lifetime(
        user_id: Uuid,
        team_id: Option<Uuid>,
        role: UserRole,
        token_type: TokenType,
        lifetime: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            nbf: now.timestamp(),
            team_id,
            role,
            token_type,
        }
    }

    /// Seconds until expiry, as reported to clients in `expires_in`
    pub fn expires_in(&self) -> i64 {
        (self.exp - self.iat).max(0)
    }
}

pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::Create(e.to_string()))
}

/// Verifies signature, expiry, not-before and issuer
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_nbf = true;
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e.to_string()),
        })
}

fn expect_type(claims: Claims, expected: TokenType) -> Result<Claims, JwtError> {
    if claims.token_type == expected {
        Ok(claims)
    } else {
        Err(JwtError::WrongType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        })
    }
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Access)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Refresh)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_lifetimes() {
        assert_eq!(TokenType::Access.lifetime(), Duration::hours(24));
        assert_eq!(TokenType::Refresh.lifetime(), Duration::days(30));
    }

    #[test]
    fn test_roundtrip_keeps_team_and_role() {
        let user_id = Uuid::new_v4();
        let team_id = Uuid::new_v4();
        let claims = Claims::new(user_id, Some(team_id), UserRole::Admin, TokenType::Access);

        let token = create_token(&claims, SECRET).unwrap();
        let validated = validate_token(&token, SECRET).unwrap();

        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.team_id, Some(team_id));
        assert_eq!(validated.role, UserRole::Admin);
        assert_eq!(validated.iss, ISSUER);
        assert_eq!(validated.expires_in(), 24 * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let claims = Claims::new(Uuid::new_v4(), None, UserRole::Member, TokenType::Access);
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(
            validate_token(&token, "another-secret-key-at-least-32-bytes"),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn test_expired_token() {
        let claims = Claims::with_lifetime(
            Uuid::new_v4(),
            None,
            UserRole::Member,
            TokenType::Access,
            Duration::seconds(-3600),
        );
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_token_type_is_enforced() {
        let refresh = create_token(
            &Claims::new(Uuid::new_v4(), None, UserRole::Member, TokenType::Refresh),
            SECRET,
        )
        .unwrap();
        let access = create_token(
            &Claims::new(Uuid::new_v4(), None, UserRole::Member, TokenType::Access),
            SECRET,
        )
        .unwrap();

        assert!(validate_refresh_token(&refresh, SECRET).is_ok());
        assert!(validate_access_token(&access, SECRET).is_ok());
        assert!(matches!(
            validate_access_token(&refresh, SECRET),
            Err(JwtError::WrongType { expected: "access", actual: "refresh" })
        ));
        assert!(validate_refresh_token(&access, SECRET).is_err());
    }
}
