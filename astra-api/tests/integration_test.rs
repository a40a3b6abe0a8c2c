/// Integration tests for the Astra API
///
/// These tests drive the full router against a real database:
/// - Registration, login and token refresh
/// - Admin-only invite issuance
/// - Support ticket triage
/// - Dashboard rollups
/// - Financial document access
///
/// Run with: cargo test -p astra-api --test integration_test -- --test-threads=1

mod common;

use astra_shared::models::user::User;
use axum::http::StatusCode;
use common::TestContext;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_health_is_public() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.request("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
    assert_eq!(body["redis"], "disabled");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.request("GET", "/v1/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = ctx.request("GET", "/v1/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_register_login_refresh_flow() {
    let ctx = TestContext::new().await.unwrap();
    let email = format!("flow-{}@example.com", Uuid::new_v4());

    let (status, registered) = ctx
        .request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "email": email,
                "password": "Correct-Horse-9",
                "full_name": "Flow Tester"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{registered}");
    assert_eq!(registered["token_type"], "Bearer");

    let (status, _) = ctx
        .request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({ "email": email, "password": "Correct-Horse-9" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": "wrong-password-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, logged_in) = ctx
        .request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": "Correct-Horse-9" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let access = logged_in["access_token"].as_str().unwrap().to_string();
    let (status, me) = ctx.request("GET", "/v1/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], email.as_str());
    assert!(me.get("password_hash").is_none());

    // An access token is not accepted as a refresh token
    let (status, _) = ctx
        .request(
            "POST",
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": access })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, refreshed) = ctx
        .request(
            "POST",
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": logged_in["refresh_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["user_id"], logged_in["user_id"]);

    let user_id: Uuid = logged_in["user_id"].as_str().unwrap().parse().unwrap();
    User::delete_atomic(&ctx.db, user_id).await.unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_admin_creates_invite() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .request(
            "POST",
            "/v1/admin/invites",
            Some(&ctx.admin_token),
            Some(json!({
                "email": "New.Hire@Example.com",
                "team_id": ctx.team.id,
                "max_uses": 3
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");

    let code = body["invite"]["code"].as_str().unwrap();
    assert_eq!(code.len(), 8);
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(body["invite"]["email"], "new.hire@example.com");
    assert_eq!(body["invite"]["state"], "active");
    assert_eq!(body["invite"]["remaining_uses"], 3);
    assert_eq!(body["email_sent"], false);
    assert!(body["share_message"].as_str().unwrap().contains(code));

    let invite_id = body["invite"]["id"].as_str().unwrap().to_string();
    let (status, body) = ctx
        .request(
            "PATCH",
            &format!("/v1/admin/invites/{invite_id}"),
            Some(&ctx.admin_token),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "deactivated");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_member_cannot_create_invite() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .request(
            "POST",
            "/v1/admin/invites",
            Some(&ctx.member_token),
            Some(json!({ "email": "someone@example.com" })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_invite_validation_errors() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .request(
            "POST",
            "/v1/admin/invites",
            Some(&ctx.admin_token),
            Some(json!({ "email": "not-an-email", "max_uses": 0 })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"max_uses"));

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_support_status_and_not_resolved_are_independent() {
    let ctx = TestContext::new().await.unwrap();

    let (status, ticket) = ctx
        .request(
            "POST",
            "/v1/support",
            Some(&ctx.member_token),
            Some(json!({
                "submission_type": "bug",
                "subject": "Upload fails",
                "message": "PDF uploads stop at 99%"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{ticket}");
    assert_eq!(ticket["status"], "needs_response");
    let id = ticket["id"].as_str().unwrap().to_string();

    let (status, responded) = ctx
        .request(
            "POST",
            &format!("/v1/admin/support/{id}/respond"),
            Some(&ctx.admin_token),
            Some(json!({
                "response": "Fixed in the latest release",
                "internal_notes": "Was a proxy body limit"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{responded}");
    assert_eq!(responded["ticket"]["status"], "responded");
    assert_eq!(responded["email_sent"], false);
    assert!(responded["ticket"]["responded_at"].is_string());

    let (status, flagged) = ctx
        .request(
            "PATCH",
            &format!("/v1/admin/support/{id}/not-resolved"),
            Some(&ctx.admin_token),
            Some(json!({ "not_resolved": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(flagged["not_resolved"], true);
    assert_eq!(flagged["status"], "responded");

    let (status, reopened) = ctx
        .request(
            "PATCH",
            &format!("/v1/admin/support/{id}/status"),
            Some(&ctx.admin_token),
            Some(json!({ "status": "needs_response" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reopened["status"], "needs_response");
    assert_eq!(reopened["not_resolved"], true);

    // The submitter never sees internal notes
    let (status, mine) = ctx
        .request("GET", "/v1/support", Some(&ctx.member_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let mine = mine.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert!(mine[0]["internal_notes"].is_null());
    assert_eq!(mine[0]["admin_response"], "Fixed in the latest release");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_dashboard_summary_rolls_up_team() {
    let ctx = TestContext::new().await.unwrap();

    for (title, category) in [("Q3 plan", "strategy"), ("Budget", "financial")] {
        let (status, body) = ctx
            .request(
                "POST",
                "/v1/documents",
                Some(&ctx.admin_token),
                Some(json!({ "title": title, "category": category })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    for mode in ["private", "team"] {
        let (status, _) = ctx
            .request(
                "POST",
                "/v1/chat/messages",
                Some(&ctx.member_token),
                Some(json!({ "mode": mode, "content": "hello" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, summary) = ctx
        .request("GET", "/v1/admin/dashboard/summary", Some(&ctx.admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{summary}");

    let team = summary["teams"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["team_id"] == ctx.team.id.to_string())
        .expect("team rollup present");

    assert_eq!(team["member_count"], 2);
    assert_eq!(team["documents_count"], 2);
    assert_eq!(team["documents"]["strategy"], 1);
    assert_eq!(team["documents"]["financial"], 1);
    assert_eq!(team["messages"]["private"], 1);
    assert_eq!(team["messages"]["team"], 1);
    assert_eq!(team["total_messages_count"], 2);

    let member = summary["users"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["user_id"] == ctx.member.id.to_string())
        .expect("member rollup present");
    assert_eq!(member["has_documents"], false);
    assert_eq!(member["messages"]["team"], 1);

    let (status, _) = ctx
        .request("GET", "/v1/admin/dashboard/summary", Some(&ctx.member_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_financial_documents_hidden_without_access() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _) = ctx
        .request(
            "POST",
            "/v1/documents",
            Some(&ctx.admin_token),
            Some(json!({ "title": "Payroll", "category": "financial" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = ctx
        .request(
            "POST",
            "/v1/documents",
            Some(&ctx.member_token),
            Some(json!({ "title": "Forecast", "category": "financial" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let team_docs = format!("/v1/documents?team_id={}", ctx.team.id);
    let (status, docs) = ctx
        .request("GET", &team_docs, Some(&ctx.member_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(docs
        .as_array()
        .unwrap()
        .iter()
        .all(|d| d["category"] != "financial"));

    let (status, docs) = ctx
        .request("GET", &team_docs, Some(&ctx.admin_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(docs
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d["title"] == "Payroll"));

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_realtime_unavailable_without_redis() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _) = ctx
        .request("GET", "/v1/realtime?tables=nope", Some(&ctx.member_token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Admin-only tables are refused to members before any connection is made
    let (status, _) = ctx
        .request("GET", "/v1/realtime?tables=invite_codes", Some(&ctx.member_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .request("GET", "/v1/realtime?tables=documents", Some(&ctx.member_token), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "service_unavailable");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_blank_support_fields_rejected() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .request(
            "POST",
            "/v1/support",
            Some(&ctx.member_token),
            Some(json!({
                "submission_type": "support",
                "subject": "   ",
                "message": "Cannot log in"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (status, ticket) = ctx
        .request(
            "POST",
            "/v1/support",
            Some(&ctx.member_token),
            Some(json!({
                "submission_type": "support",
                "subject": "Login",
                "message": "Cannot log in"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{ticket}");
    let id = ticket["id"].as_str().unwrap().to_string();

    let (status, body) = ctx
        .request(
            "POST",
            &format!("/v1/admin/support/{id}/respond"),
            Some(&ctx.admin_token),
            Some(json!({ "response": " \n " })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    // The ticket was not touched
    let (_, mine) = ctx
        .request("GET", "/v1/support", Some(&ctx.member_token), None)
        .await;
    let mine = mine.as_array().unwrap();
    assert_eq!(mine[0]["status"], "needs_response");
    assert!(mine[0]["admin_response"].is_null());

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_schedule_writes_pending_draft_first() {
    let ctx = TestContext::new().await.unwrap();

    let (status, campaign) = ctx
        .request(
            "POST",
            "/v1/admin/marketing-emails",
            Some(&ctx.admin_token),
            Some(json!({ "subject": "v1", "html_body": "<p>v1</p>" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{campaign}");
    let id = campaign["id"].as_str().unwrap().to_string();

    let (status, _) = ctx
        .request(
            "PUT",
            &format!("/v1/admin/marketing-emails/{id}/draft"),
            Some(&ctx.admin_token),
            Some(json!({ "subject": "v2", "html_body": "<p>v2</p>" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    // Scheduled well inside the autosave delay
    let at = chrono::Utc::now() + chrono::Duration::hours(1);
    let (status, scheduled) = ctx
        .request(
            "POST",
            &format!("/v1/admin/marketing-emails/{id}/schedule"),
            Some(&ctx.admin_token),
            Some(json!({ "scheduled_at": at })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{scheduled}");
    assert_eq!(scheduled["status"], "scheduled");
    assert_eq!(scheduled["subject"], "v2");
    assert_eq!(scheduled["html_body"], "<p>v2</p>");

    // A draft still waiting when the admin saves explicitly is discarded
    ctx.request(
        "PUT",
        &format!("/v1/admin/marketing-emails/{id}/draft"),
        Some(&ctx.admin_token),
        Some(json!({ "subject": "stale", "html_body": "<p>stale</p>" })),
    )
    .await;
    let (status, updated) = ctx
        .request(
            "PUT",
            &format!("/v1/admin/marketing-emails/{id}"),
            Some(&ctx.admin_token),
            Some(json!({ "subject": "v3" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");

    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
    let (_, current) = ctx
        .request(
            "GET",
            &format!("/v1/admin/marketing-emails/{id}"),
            Some(&ctx.admin_token),
            None,
        )
        .await;
    assert_eq!(current["subject"], "v3");
    assert_eq!(current["html_body"], "<p>v2</p>");

    let (status, _) = ctx
        .request(
            "DELETE",
            &format!("/v1/admin/marketing-emails/{id}"),
            Some(&ctx.admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    ctx.cleanup().await.unwrap();
}
