/// Third-party HTTP clients
///
/// - [`email`]: Transactional email delivery
/// - [`ai`]: Generative-language text generation
/// - [`google`]: Google OAuth token exchange and refresh
/// - [`drive`]: Drive sync webhook
///
/// Every client takes its base URL from configuration so tests can point it
/// at a mock server. Non-2xx responses become [`IntegrationError::Api`] with
/// the best message that could be found in the body.

pub mod ai;
pub mod drive;
pub mod email;
pub mod google;

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// Pulls a human-readable error out of an upstream error body
///
/// Looks at `error.message`, `error_description`, `message`, then `error`
/// (when it is a string), falling back to a generic message with the status.
pub fn extract_error_message(body: &str, status: u16) -> String {
    let fallback = || format!("request failed with status {status}");

    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return fallback();
    };

    let candidates = [
        value.pointer("/error/message"),
        value.get("error_description"),
        value.get("message"),
        value.get("error"),
    ];

    let found = candidates
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string);

    found.unwrap_or_else(fallback)
}

/// Returns the response if it is 2xx, otherwise an [`IntegrationError::Api`]
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(IntegrationError::Api {
        status: status.as_u16(),
        message: extract_error_message(&body, status.as_u16()),
    })
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, IntegrationError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("astra/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Joins a base URL and a path without doubling slashes
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_nested_error_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        assert_eq!(extract_error_message(body, 400), "API key not valid");
    }

    #[test]
    fn test_extracts_oauth_description_before_code() {
        let body = r#"{"error":"invalid_grant","error_description":"Bad Request"}"#;
        assert_eq!(extract_error_message(body, 400), "Bad Request");
    }

    #[test]
    fn test_extracts_top_level_message_then_error_string() {
        assert_eq!(
            extract_error_message(r#"{"message":"Missing API key","statusCode":401}"#, 401),
            "Missing API key"
        );
        assert_eq!(extract_error_message(r#"{"error":"invalid_client"}"#, 401), "invalid_client");
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(extract_error_message("", 502), "request failed with status 502");
        assert_eq!(extract_error_message("<html>oops</html>", 500), "request failed with status 500");
        assert_eq!(extract_error_message(r#"{"error":{"code":7}}"#, 403), "request failed with status 403");
        assert_eq!(extract_error_message(r#"{"message":"  "}"#, 429), "request failed with status 429");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://api.example.com/", "/emails"), "https://api.example.com/emails");
        assert_eq!(join_url("http://127.0.0.1:1234", "emails"), "http://127.0.0.1:1234/emails");
    }
}
