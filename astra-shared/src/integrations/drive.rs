/// Drive sync webhook
///
/// Synchronisation itself runs in an external service. This client posts a
/// JSON request to its webhook and signs the exact body bytes with
/// HMAC-SHA256; the hex digest travels in [`SIGNATURE_HEADER`]. The caller
/// bounds the call with a deadline.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{build_http_client, ensure_success, IntegrationError};

pub const SIGNATURE_HEADER: &str = "X-Astra-Signature";

#[derive(Debug, Clone)]
pub struct DriveSyncConfig {
    pub webhook_url: String,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub user_id: Uuid,
    pub folder_id: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// What the sync service reported back
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncOutcome {
    #[serde(default)]
    pub files_synced: Option<u64>,

    #[serde(default)]
    pub message: Option<String>,
}

/// Hex HMAC-SHA256 of `payload` under `secret`
pub fn sign_payload(secret: &[u8], payload: &[u8]) -> Result<String, IntegrationError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| IntegrationError::InvalidResponse(format!("invalid signing key: {e}")))?;
    mac.update(payload);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Clone)]
pub struct DriveSyncClient {
    http: reqwest::Client,
    config: DriveSyncConfig,
}

impl DriveSyncClient {
    pub fn new(config: DriveSyncConfig) -> Result<Self, IntegrationError> {
        // Generous transport timeout; the caller's deadline is the real bound
        Ok(Self {
            http: build_http_client(Duration::from_secs(600))?,
            config,
        })
    }

    pub async fn trigger(&self, request: &SyncRequest) -> Result<SyncOutcome, IntegrationError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;
        let signature = sign_payload(self.config.secret.as_bytes(), &body)?;

        info!(user_id = %request.user_id, "Triggering Drive sync");

        let response = self
            .http
            .post(&self.config.webhook_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await?;

        let text = ensure_success(response).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(SyncOutcome::default());
        }

        serde_json::from_str(&text).map_err(|e| IntegrationError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_signature_is_stable_hex() {
        let a = sign_payload(b"secret", b"{\"a\":1}").unwrap();
        let b = sign_payload(b"secret", b"{\"a\":1}").unwrap();
        let c = sign_payload(b"other", b"{\"a\":1}").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn posts_signed_body() {
        let server = MockServer::start().await;
        let request = SyncRequest {
            user_id: Uuid::new_v4(),
            folder_id: Some("folder-1".to_string()),
            requested_at: Utc::now(),
        };
        let expected = sign_payload(b"hook-secret", &serde_json::to_vec(&request).unwrap()).unwrap();

        Mock::given(method("POST"))
            .and(path("/sync"))
            .and(header(SIGNATURE_HEADER, expected.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"files_synced": 12})))
            .expect(1)
            .mount(&server)
            .await;

        let client = DriveSyncClient::new(DriveSyncConfig {
            webhook_url: format!("{}/sync", server.uri()),
            secret: "hook-secret".to_string(),
        })
        .unwrap();

        let outcome = client.trigger(&request).await.unwrap();
        assert_eq!(outcome.files_synced, Some(12));
    }

    #[tokio::test]
    async fn empty_success_body_is_accepted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let client = DriveSyncClient::new(DriveSyncConfig {
            webhook_url: server.uri(),
            secret: "hook-secret".to_string(),
        })
        .unwrap();

        let outcome = client
            .trigger(&SyncRequest {
                user_id: Uuid::new_v4(),
                folder_id: None,
                requested_at: Utc::now(),
            })
            .await
            .unwrap();
        assert!(outcome.files_synced.is_none());
    }
}
