/// Google OAuth
///
/// Authorization codes obtained by the client are exchanged here for access
/// and refresh tokens, which stay on the server. The worker later renews
/// access tokens with the refresh grant.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{build_http_client, ensure_success, IntegrationError};

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub userinfo_url: String,
}

/// Token endpoint response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,

    /// Only present on first consent or when Google rotates it
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Seconds until `access_token` expires
    pub expires_in: i64,

    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + ChronoDuration::seconds(self.expires_in.max(0))
    }
}

#[derive(Deserialize)]
struct UserInfo {
    email: Option<String>,
}

#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    config: GoogleOAuthConfig,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleOAuthConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: build_http_client(Duration::from_secs(15))?,
            config,
        })
    }

    /// Trades an authorization code for tokens
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, IntegrationError> {
        debug!("Exchanging Google authorization code");

        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }

    /// Obtains a fresh access token from a refresh token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, IntegrationError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }

    /// Looks up the Google account email; `None` if it cannot be read
    pub async fn account_email(&self, access_token: &str) -> Option<String> {
        let result = async {
            let response = self
                .http
                .get(&self.config.userinfo_url)
                .bearer_auth(access_token)
                .send()
                .await?;
            let info: UserInfo = ensure_success(response)
                .await?
                .json()
                .await
                .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;
            Ok::<_, IntegrationError>(info.email)
        }
        .await;

        match result {
            Ok(email) => email,
            Err(e) => {
                warn!(error = %e, "Could not read Google account email");
                None
            }
        }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, IntegrationError> {
        let response = self.http.post(&self.config.token_url).form(form).send().await?;

        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))
    }
}
