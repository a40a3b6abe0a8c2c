/// Generative-language client
///
/// `POST {base}/models/{model}:generateContent?key=...` with a list of
/// conversation turns and an optional system instruction. The reply text is
/// the concatenation of the first candidate's text parts.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{build_http_client, ensure_success, join_url, IntegrationError};

pub const DEFAULT_AI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_AI_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<TurnRole>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Clone)]
pub struct GenerativeClient {
    http: reqwest::Client,
    config: AiConfig,
}

impl GenerativeClient {
    pub fn new(config: AiConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            http: build_http_client(Duration::from_secs(60))?,
            config,
        })
    }

    pub async fn generate(
        &self,
        system: Option<&str>,
        turns: &[Turn],
    ) -> Result<String, IntegrationError> {
        let request = GenerateRequest {
            contents: turns
                .iter()
                .map(|turn| Content {
                    role: Some(turn.role),
                    parts: vec![Part {
                        text: Some(turn.text.clone()),
                    }],
                })
                .collect(),
            system_instruction: system.map(|text| Content {
                role: None,
                parts: vec![Part {
                    text: Some(text.to_string()),
                }],
            }),
        };

        let url = join_url(
            &self.config.api_url,
            &format!("models/{}:generateContent", self.config.model),
        );
        debug!(model = %self.config.model, turns = turns.len(), "Requesting generation");

        let response = self
            .http
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let body: GenerateResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(IntegrationError::InvalidResponse(
                "model returned no text".to_string(),
            ));
        }

        Ok(text)
    }
}
