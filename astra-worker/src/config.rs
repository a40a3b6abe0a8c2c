/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 5)
/// - `REDIS_URL`: publishes change events when set
/// - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`: enable token refresh
/// - `EMAIL_API_KEY`, `EMAIL_FROM`, `EMAIL_API_URL`: enable campaign delivery
/// - `TOKEN_REFRESH_INTERVAL_SECS`: refresh poll period (default 300)
/// - `CAMPAIGN_POLL_INTERVAL_SECS`: scheduled campaign poll period (default 60)
/// - `CAMPAIGN_BATCH_SIZE`: campaigns claimed per poll (default 10)

use astra_shared::integrations::{
    email::{EmailConfig, DEFAULT_EMAIL_API_URL},
    google::{GoogleOAuthConfig, DEFAULT_TOKEN_URL, DEFAULT_USERINFO_URL},
};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CAMPAIGN_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub redis_url: Option<String>,
    pub google: Option<GoogleOAuthConfig>,
    pub email: Option<EmailConfig>,
    pub token_refresh_interval: Duration,
    pub campaign_poll_interval: Duration,
    pub campaign_batch_size: i64,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
        where
            T::Err: std::fmt::Display,
        {
            match value {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
                None => Ok(default),
            }
        }

        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let refresh_secs = parse_or(
            var("TOKEN_REFRESH_INTERVAL_SECS"),
            "TOKEN_REFRESH_INTERVAL_SECS",
            DEFAULT_TOKEN_REFRESH_INTERVAL.as_secs(),
        )?;
        let campaign_secs = parse_or(
            var("CAMPAIGN_POLL_INTERVAL_SECS"),
            "CAMPAIGN_POLL_INTERVAL_SECS",
            DEFAULT_CAMPAIGN_POLL_INTERVAL.as_secs(),
        )?;

        if refresh_secs == 0 || campaign_secs == 0 {
            anyhow::bail!("Poll intervals must be at least one second");
        }

        let google = match (var("GOOGLE_CLIENT_ID"), var("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                token_url: var("GOOGLE_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
                userinfo_url: var("GOOGLE_USERINFO_URL")
                    .unwrap_or_else(|| DEFAULT_USERINFO_URL.to_string()),
            }),
            _ => None,
        };

        let email = var("EMAIL_API_KEY").map(|api_key| EmailConfig {
            api_url: var("EMAIL_API_URL").unwrap_or_else(|| DEFAULT_EMAIL_API_URL.to_string()),
            api_key,
            from: var("EMAIL_FROM")
                .unwrap_or_else(|| "Astra Intelligence <noreply@astraintelligence.app>".to_string()),
        });

        Ok(Self {
            database_url,
            max_connections: parse_or(var("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 5)?,
            redis_url: var("REDIS_URL"),
            google,
            email,
            token_refresh_interval: Duration::from_secs(refresh_secs),
            campaign_poll_interval: Duration::from_secs(campaign_secs),
            campaign_batch_size: parse_or(var("CAMPAIGN_BATCH_SIZE"), "CAMPAIGN_BATCH_SIZE", 10)?,
        })
    }
}
