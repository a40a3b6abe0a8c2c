/// Transactional email
///
/// `POST {base}/emails` with a bearer API key:
///
/// ```json
/// {"from": "...", "to": ["..."], "subject": "...", "html": "..."}
/// ```
///
/// The provider answers `{"id": "..."}`.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{build_http_client, ensure_success, join_url, IntegrationError};
use crate::models::{invite_code::InviteCode, support_submission::SupportSubmission};

pub const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

/// A rendered email ready to send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Clone)]
pub struct EmailClient {
    http: reqwest::Client,
    config: EmailConfig,
}

impl EmailClient {
    pub fn new(config: EmailConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: build_http_client(Duration::from_secs(30))?,
            config,
        })
    }

    /// Sends one email and returns the provider's message id
    pub async fn send(&self, message: &EmailMessage) -> Result<String, IntegrationError> {
        debug!(recipients = message.to.len(), subject = %message.subject, "Sending email");

        let response = self
            .http
            .post(join_url(&self.config.api_url, "emails"))
            .bearer_auth(&self.config.api_key)
            .json(&SendRequest {
                from: &self.config.from,
                to: &message.to,
                subject: &message.subject,
                html: &message.html,
            })
            .send()
            .await?;

        let body: SendResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

        info!(email_id = %body.id, "Email accepted by provider");
        Ok(body.id)
    }
}

/// Invitation email carrying the code and signup link
pub fn invite_email(invite: &InviteCode, app_url: &str) -> EmailMessage {
    let signup = format!("{}/signup", app_url.trim_end_matches('/'));

    EmailMessage {
        to: vec![invite.email.clone()],
        subject: "You're invited to Astra Intelligence".to_string(),
        html: format!(
            "<p>You've been invited to join Astra Intelligence.</p>\
             <p>Your invite code is <strong>{code}</strong>.</p>\
             <p><a href=\"{signup}\">Create your account</a> with <strong>{email}</strong> and enter the code when asked.</p>",
            code = invite.code,
            email = html_escape(&invite.email),
        ),
    }
}

/// Notification that an admin answered a support ticket
pub fn support_response_email(to: &str, ticket: &SupportSubmission) -> EmailMessage {
    let response = ticket.admin_response.as_deref().unwrap_or_default();

    EmailMessage {
        to: vec![to.to_string()],
        subject: format!("Re: {}", ticket.subject),
        html: format!(
            "<p>We've responded to your {kind}: <strong>{subject}</strong></p>\
             <blockquote>{response}</blockquote>",
            kind = ticket.submission_type.label().to_lowercase(),
            subject = html_escape(&ticket.subject),
            response = html_escape(response).replace('\n', "<br>"),
        ),
    }
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
