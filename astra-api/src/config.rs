/// Configuration management for the API server
///
/// Loaded from environment variables (and a `.env` file in development).
/// Integrations are optional: a missing key disables the integration and
/// the endpoints that need it answer `503 Service Unavailable`.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `JWT_SECRET`: HS256 signing secret, at least 32 characters (required)
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:8080`)
/// - `APP_URL`: public client URL used in invite links
/// - `CORS_ORIGINS`: comma-separated origins, `*` for development
/// - `PRODUCTION`: enables HSTS
/// - `REDIS_URL`: enables the realtime change feed
/// - `EMAIL_API_KEY`, `EMAIL_FROM`, `EMAIL_API_URL`
/// - `AI_API_KEY`, `AI_MODEL`, `AI_API_URL`
/// - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_TOKEN_URL`, `GOOGLE_USERINFO_URL`
/// - `DRIVE_SYNC_WEBHOOK_URL`, `DRIVE_SYNC_WEBHOOK_SECRET`
///
/// # Example
///
/// ```no_run
/// use astra_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use astra_shared::integrations::{
    ai::{AiConfig, DEFAULT_AI_API_URL, DEFAULT_AI_MODEL},
    drive::DriveSyncConfig,
    email::{EmailConfig, DEFAULT_EMAIL_API_URL},
    google::{GoogleOAuthConfig, DEFAULT_TOKEN_URL, DEFAULT_USERINFO_URL},
};
use std::env;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// Redis URL for the realtime change feed
    pub redis_url: Option<String>,

    pub email: Option<EmailConfig>,
    pub ai: Option<AiConfig>,
    pub google: Option<GoogleOAuthConfig>,
    pub drive: Option<DriveSyncConfig>,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,

    /// Public URL of the client app, used in invite links
    pub app_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing or a value does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = var("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()?;

        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let cors_origins = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let production = var("PRODUCTION")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let email = var("EMAIL_API_KEY").map(|api_key| EmailConfig {
            api_url: var("EMAIL_API_URL").unwrap_or_else(|| DEFAULT_EMAIL_API_URL.to_string()),
            api_key,
            from: var("EMAIL_FROM")
                .unwrap_or_else(|| "Astra Intelligence <noreply@astraintelligence.app>".to_string()),
        });

        let ai = var("AI_API_KEY").map(|api_key| AiConfig {
            api_url: var("AI_API_URL").unwrap_or_else(|| DEFAULT_AI_API_URL.to_string()),
            api_key,
            model: var("AI_MODEL").unwrap_or_else(|| DEFAULT_AI_MODEL.to_string()),
        });

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

        let drive = match (var("DRIVE_SYNC_WEBHOOK_URL"), var("DRIVE_SYNC_WEBHOOK_SECRET")) {
            (Some(webhook_url), Some(secret)) => Some(DriveSyncConfig { webhook_url, secret }),
            (Some(_), None) => {
                anyhow::bail!("DRIVE_SYNC_WEBHOOK_SECRET is required when DRIVE_SYNC_WEBHOOK_URL is set")
            }
            _ => None,
        };

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
                cors_origins,
                production,
                app_url: var("APP_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig { secret: jwt_secret },
            redis_url: var("REDIS_URL"),
            email,
            ai,
            google,
            drive,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
