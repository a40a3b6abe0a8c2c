/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use astra_api::{app::{build_router, AppState}, config::Config};
/// use astra_shared::redis::ChangePublisher;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config, ChangePublisher::disabled())?;
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    middleware::security::SecurityHeadersLayer,
};
use astra_shared::{
    auth::middleware::authenticate,
    campaigns::DraftSink,
    debounce::{Debouncer, DRAFT_DEBOUNCE},
    integrations::{
        ai::GenerativeClient, drive::DriveSyncClient, email::EmailClient,
        google::GoogleOAuthClient, IntegrationError,
    },
    models::marketing_email::DraftContent,
    redis::ChangePublisher,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self as axum_middleware, Next},
    response::Response,
    routing::{get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

/// Shared application state
///
/// Cloned for each request via axum's `State` extractor. Integration
/// clients are `None` when their configuration is missing.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// Realtime change feed
    pub changes: ChangePublisher,

    pub email: Option<Arc<EmailClient>>,
    pub ai: Option<Arc<GenerativeClient>>,
    pub google: Option<Arc<GoogleOAuthClient>>,
    pub drive: Option<Arc<DriveSyncClient>>,

    /// Trailing debounce for marketing composer autosave
    pub drafts: Debouncer<Uuid, DraftContent>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: Config,
        changes: ChangePublisher,
    ) -> Result<Self, IntegrationError> {
        let email = config.email.clone().map(EmailClient::new).transpose()?;
        let ai = config.ai.clone().map(GenerativeClient::new).transpose()?;
        let google = config.google.clone().map(GoogleOAuthClient::new).transpose()?;
        let drive = config.drive.clone().map(DriveSyncClient::new).transpose()?;

        let drafts = Debouncer::new(
            DRAFT_DEBOUNCE,
            Arc::new(DraftSink::new(db.clone(), changes.clone())),
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            changes,
            email: email.map(Arc::new),
            ai: ai.map(Arc::new),
            google: google.map(Arc::new),
            drive: drive.map(Arc::new),
            drafts,
        })
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn email(&self) -> ApiResult<Arc<EmailClient>> {
        self.email
            .clone()
            .ok_or_else(|| IntegrationError::NotConfigured("Email delivery").into())
    }

    pub fn ai(&self) -> ApiResult<Arc<GenerativeClient>> {
        self.ai
            .clone()
            .ok_or_else(|| IntegrationError::NotConfigured("AI generation").into())
    }

    pub fn google(&self) -> ApiResult<Arc<GoogleOAuthClient>> {
        self.google
            .clone()
            .ok_or_else(|| IntegrationError::NotConfigured("Google OAuth").into())
    }

    pub fn drive(&self) -> ApiResult<Arc<DriveSyncClient>> {
        self.drive
            .clone()
            .ok_or_else(|| IntegrationError::NotConfigured("Drive sync").into())
    }
}

/// Builds the complete router with all routes and middleware
///
/// ```text
/// /health                                  public
/// /v1/auth/{register,login,refresh}        public
/// /v1/...                                  bearer JWT
/// /v1/admin/...                            bearer JWT, admin checked per handler
/// ```
///
/// Middleware, outermost first: security headers, CORS, compression (gzip
/// or brotli, never applied to event streams), tracing, then JWT
/// authentication on the protected routes.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let admin_routes = Router::new()
        .route("/users", get(routes::users::list_users))
        .route(
            "/users/:id",
            patch(routes::users::update_user).delete(routes::users::delete_user),
        )
        .route("/dashboard", get(routes::dashboard::get_dashboard))
        .route("/dashboard/summary", get(routes::dashboard::get_summary))
        .route(
            "/invites",
            get(routes::invites::list_invites).post(routes::invites::create_invite),
        )
        .route("/invites/:id", patch(routes::invites::update_invite))
        .route("/support", get(routes::support::list_all_tickets))
        .route("/support/:id/respond", post(routes::support::respond))
        .route("/support/:id/status", patch(routes::support::set_status))
        .route(
            "/support/:id/not-resolved",
            patch(routes::support::set_not_resolved),
        )
        .route(
            "/marketing-emails",
            get(routes::marketing::list_campaigns).post(routes::marketing::create_campaign),
        )
        .route(
            "/marketing-emails/generate",
            post(routes::marketing::generate_content),
        )
        .route(
            "/marketing-emails/:id",
            get(routes::marketing::get_campaign)
                .put(routes::marketing::update_campaign)
                .delete(routes::marketing::delete_campaign),
        )
        .route("/marketing-emails/:id/draft", put(routes::marketing::save_draft))
        .route(
            "/marketing-emails/:id/schedule",
            post(routes::marketing::schedule_campaign),
        )
        .route("/marketing-emails/:id/send", post(routes::marketing::send_campaign));

    let protected_routes = Router::new()
        .route(
            "/me",
            get(routes::me::get_me).patch(routes::me::update_me),
        )
        .route("/me/activity", post(routes::me::record_activity))
        .route(
            "/teams",
            get(routes::teams::list_teams).post(routes::teams::create_team),
        )
        .route(
            "/teams/:id",
            get(routes::teams::get_team).delete(routes::teams::delete_team),
        )
        .route(
            "/documents",
            get(routes::documents::list_documents).post(routes::documents::create_document),
        )
        .route(
            "/chat/messages",
            get(routes::chat::list_messages).post(routes::chat::post_message),
        )
        .route(
            "/reports",
            get(routes::reports::list_reports).post(routes::reports::create_report),
        )
        .route(
            "/support",
            get(routes::support::list_my_tickets).post(routes::support::create_ticket),
        )
        .route(
            "/integrations/gmail",
            get(routes::integrations::gmail_status).delete(routes::integrations::gmail_disconnect),
        )
        .route(
            "/integrations/gmail/exchange",
            post(routes::integrations::gmail_exchange),
        )
        .route("/integrations/drive/sync", post(routes::integrations::drive_sync))
        .route("/assistant", post(routes::assistant::ask))
        .route("/launch-progress", get(routes::launch::get_progress))
        .route("/realtime", get(routes::realtime::subscribe))
        .nest("/admin", admin_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Validates the bearer token and injects the caller's `AuthContext`
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
