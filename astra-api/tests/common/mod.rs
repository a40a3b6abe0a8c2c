/// Common test utilities for integration tests
///
/// Requires a running PostgreSQL database (`DATABASE_URL`) and a
/// `JWT_SECRET`. Redis is not used; the change feed runs disabled.

use astra_api::app::{build_router, AppState};
use astra_api::config::Config;
use astra_shared::auth::jwt::{create_token, Claims, TokenType};
use astra_shared::models::team::{CreateTeam, Team};
use astra_shared::models::user::{CreateUser, User, UserRole};
use astra_shared::redis::ChangePublisher;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

/// Test context: a fresh team with one admin and one member
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
    pub team: Team,
    pub admin: User,
    pub member: User,
    pub admin_token: String,
    pub member_token: String,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_env()?;

        let db = PgPool::connect(&config.database.url).await?;

        // Path relative to Cargo.toml, not this file
        sqlx::migrate!("../migrations").run(&db).await?;

        let team = Team::create(
            &db,
            CreateTeam {
                name: format!("Test Team {}", Uuid::new_v4()),
            },
        )
        .await?;

        let admin = create_user(&db, Some(team.id), UserRole::Admin).await?;
        let member = create_user(&db, Some(team.id), UserRole::Member).await?;

        let admin_token = token_for(&admin, &config.jwt.secret)?;
        let member_token = token_for(&member, &config.jwt.secret)?;

        let state = AppState::new(db.clone(), config.clone(), ChangePublisher::disabled())?;
        let app = build_router(state);

        Ok(TestContext {
            db,
            app,
            config,
            team,
            admin,
            member,
            admin_token,
            member_token,
        })
    }

    pub fn auth_header(token: &str) -> String {
        format!("Bearer {}", token)
    }

    /// Sends a request and returns the status and parsed JSON body
    ///
    /// Empty bodies come back as `Value::Null`.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header("authorization", Self::auth_header(token));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("Non-JSON body ({}): {}", status, String::from_utf8_lossy(&bytes))
            })
        };

        (status, json)
    }

    /// Removes the users and team created by this context
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        User::delete_atomic(&self.db, self.member.id).await?;
        User::delete_atomic(&self.db, self.admin.id).await?;
        Team::delete(&self.db, self.team.id).await?;
        Ok(())
    }
}

pub async fn create_user(
    db: &PgPool,
    team_id: Option<Uuid>,
    role: UserRole,
) -> anyhow::Result<User> {
    let user = User::create(
        db,
        CreateUser {
            email: format!("test-{}@example.com", Uuid::new_v4()),
            password_hash: "test_hash".to_string(), // Not used in tests
            full_name: Some("Test User".to_string()),
            team_id,
            role,
            can_view_financials: role == UserRole::Admin,
        },
    )
    .await?;

    Ok(user)
}

pub fn token_for(user: &User, secret: &str) -> anyhow::Result<String> {
    let claims = Claims::new(user.id, user.team_id, user.role, TokenType::Access);
    Ok(create_token(&claims, secret)?)
}
