use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::core::formatter::truncate;
use crate::core::models::usage::{StoredToken, UsageSnapshot};
use crate::core::parser::{parse_raw_response, RawUsageResponse};

pub const USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";
pub const ANTHROPIC_BETA: &str = "oauth-2025-04-20";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const EXCERPT_LEN: usize = 120;

const AUTH_KEYWORDS: &[&str] = &[
    "auth",
    "unauthorized",
    "forbidden",
    "invalid token",
    "token expired",
    "oauth",
    "credential",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to parse API response: {0}")]
    InvalidBody(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("API error: {0}")]
    Api(String),
    #[error("Unexpected API response shape: {0}")]
    UnexpectedShape(String),
}

impl UsageError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Anything that can turn a token into a usage snapshot.
#[async_trait]
pub trait UsageApi: Send + Sync {
    /// Single attempt; retries are the caller's business.
    async fn get_usage(&self, token: &StoredToken) -> Result<UsageSnapshot, UsageError>;

    /// Toggle diagnostic mode (verbose logs plus raw payload on snapshots).
    fn set_debug(&mut self, _enabled: bool) {}
}

/// HTTP client for the Anthropic OAuth usage endpoint.
pub struct UsageClient {
    http: reqwest::Client,
    endpoint: String,
    debug: bool,
}

impl UsageClient {
    pub fn new(debug: bool) -> Result<Self, UsageError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UsageError::Network(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: USAGE_URL.to_string(),
            debug,
        })
    }
}

#[async_trait]
impl UsageApi for UsageClient {
    async fn get_usage(&self, token: &StoredToken) -> Result<UsageSnapshot, UsageError> {
        if self.debug {
            debug!(token = %format!("…{}", token.suffix()), "Fetching usage");
        }

        let response = self
            .http
            .get(&self.endpoint)
            .header("Authorization", format!("Bearer {}", token.access_token))
            .header("anthropic-beta", ANTHROPIC_BETA)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| UsageError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| UsageError::Network(e.to_string()))?;

        if self.debug {
            debug!(status, body_len = body.len(), "Usage response received");
        }

        interpret_response(status, &body, self.debug)
    }

    fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }
}

/// Classify a raw HTTP response into a snapshot or an error.
///
/// The endpoint has been seen answering auth failures with HTTP 200 and an
/// error envelope, so the body is inspected before the status code is trusted.
pub fn interpret_response(
    status: u16,
    body: &str,
    include_raw: bool,
) -> Result<UsageSnapshot, UsageError> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|_| UsageError::InvalidBody(truncate(body, EXCERPT_LEN)))?;

    let success = (200..300).contains(&status);
    let envelope = ErrorEnvelope::from_body(&parsed);
    let message = envelope.as_ref().and_then(|e| e.message.clone());

    let is_auth = matches!(status, 401 | 403)
        || ((!success || envelope.is_some())
            && mentions_auth(envelope.as_ref(), &parsed.to_string()));

    if is_auth {
        return Err(UsageError::Auth(
            message.unwrap_or_else(|| "Authentication failed".to_string()),
        ));
    }

    if !success {
        return Err(UsageError::Http {
            status,
            message: message.unwrap_or_else(|| format!("Unexpected HTTP {}", status)),
        });
    }

    if envelope.is_some() {
        return Err(UsageError::Api(
            message.unwrap_or_else(|| "Unknown API error".to_string()),
        ));
    }

    let has_windows = ["five_hour", "seven_day"]
        .iter()
        .all(|key| parsed.get(key).is_some_and(Value::is_object));
    if !has_windows {
        return Err(UsageError::UnexpectedShape(truncate(
            &parsed.to_string(),
            EXCERPT_LEN,
        )));
    }

    let raw: RawUsageResponse = serde_json::from_value(parsed)
        .map_err(|e| UsageError::UnexpectedShape(truncate(&e.to_string(), EXCERPT_LEN)))?;

    Ok(parse_raw_response(raw, include_raw))
}

/// `{"type": "error", "error": {"type"?, "message"?}}`
struct ErrorEnvelope {
    kind: Option<String>,
    message: Option<String>,
}

impl ErrorEnvelope {
    fn from_body(body: &Value) -> Option<Self> {
        if body.get("type").and_then(Value::as_str) != Some("error") {
            return None;
        }
        let error = body.get("error");
        let field = |name: &str| {
            error
                .and_then(|e| e.get(name))
                .and_then(Value::as_str)
                .map(String::from)
        };
        Some(Self {
            kind: field("type"),
            message: field("message"),
        })
    }
}

fn mentions_auth(envelope: Option<&ErrorEnvelope>, body: &str) -> bool {
    let mut haystacks: Vec<String> = vec![body.to_lowercase()];
    if let Some(e) = envelope {
        haystacks.extend(e.kind.iter().map(|s| s.to_lowercase()));
        haystacks.extend(e.message.iter().map(|s| s.to_lowercase()));
    }
    haystacks
        .iter()
        .any(|text| AUTH_KEYWORDS.iter().any(|kw| text.contains(kw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_BODY: &str = r#"{
        "five_hour": { "utilization": 72.5, "resets_at": "2026-02-18T15:59:59.943648+00:00" },
        "seven_day": { "utilization": 35.0, "resets_at": "2026-02-22T03:59:59.943679+00:00" }
    }"#;

    #[test]
    fn api_constants() {
        assert_eq!(USAGE_URL, "https://api.anthropic.com/api/oauth/usage");
        assert_eq!(ANTHROPIC_BETA, "oauth-2025-04-20");
    }

    #[test]
    fn success_returns_snapshot() {
        let snap = interpret_response(200, OK_BODY, false).unwrap();
        assert_eq!(snap.five_hour.percent, 72.5);
        assert_eq!(snap.weekly.percent, 35.0);
        assert!(snap.raw.is_none());
    }

    #[test]
    fn debug_mode_attaches_raw() {
        let snap = interpret_response(200, OK_BODY, true).unwrap();
        assert!(snap.raw.is_some());
    }

    #[test]
    fn auth_error_envelope_with_http_200_is_auth() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"OAuth token has expired"}}"#;
        let err = interpret_response(200, body, false).unwrap_err();
        assert_eq!(err, UsageError::Auth("OAuth token has expired".to_string()));
    }

    #[test]
    fn http_401_is_auth_regardless_of_body() {
        let err = interpret_response(401, r#"{"detail":"nope"}"#, false).unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err, UsageError::Auth("Authentication failed".to_string()));
    }

    #[test]
    fn http_403_is_auth() {
        let err = interpret_response(403, "{}", false).unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn non_2xx_with_auth_keyword_is_auth() {
        let body = r#"{"type":"error","error":{"type":"permission_error","message":"Invalid token supplied"}}"#;
        let err = interpret_response(400, body, false).unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn keyword_anywhere_in_body_counts() {
        let body = r#"{"detail":{"reason":"credential revoked"}}"#;
        let err = interpret_response(500, body, false).unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let body = r#"{"type":"error","error":{"message":"UNAUTHORIZED"}}"#;
        assert!(interpret_response(200, body, false).unwrap_err().is_auth());
    }

    #[test]
    fn server_error_without_keywords_is_generic() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = interpret_response(529, body, false).unwrap_err();
        assert_eq!(
            err,
            UsageError::Http {
                status: 529,
                message: "Overloaded".to_string()
            }
        );
    }

    #[test]
    fn non_2xx_without_message_reports_status() {
        let err = interpret_response(502, "{}", false).unwrap_err();
        assert_eq!(
            err,
            UsageError::Http {
                status: 502,
                message: "Unexpected HTTP 502".to_string()
            }
        );
    }

    #[test]
    fn envelope_with_2xx_and_no_keywords_is_generic_api_error() {
        let body = r#"{"type":"error","error":{"type":"rate_limit_error","message":"Slow down"}}"#;
        let err = interpret_response(200, body, false).unwrap_err();
        assert_eq!(err, UsageError::Api("Slow down".to_string()));
    }

    #[test]
    fn unparseable_body_is_generic_with_excerpt() {
        let body = format!("<html>{}</html>", "x".repeat(500));
        let err = interpret_response(200, &body, false).unwrap_err();
        match err {
            UsageError::InvalidBody(excerpt) => {
                assert!(excerpt.starts_with("<html>"));
                assert!(excerpt.chars().count() <= 121);
            }
            other => panic!("expected InvalidBody, got {:?}", other),
        }
    }

    #[test]
    fn unparseable_body_with_auth_words_is_still_generic() {
        let err = interpret_response(401, "Unauthorized", false).unwrap_err();
        assert!(matches!(err, UsageError::InvalidBody(_)));
    }

    #[test]
    fn missing_window_is_unexpected_shape() {
        let body = r#"{"five_hour":{"utilization":1.0}}"#;
        let err = interpret_response(200, body, false).unwrap_err();
        assert!(matches!(err, UsageError::UnexpectedShape(_)));
        assert!(!err.is_auth());
    }

    #[test]
    fn window_without_utilization_is_unexpected_shape() {
        let body = r#"{"five_hour":{},"seven_day":{}}"#;
        let err = interpret_response(200, body, false).unwrap_err();
        assert!(matches!(err, UsageError::UnexpectedShape(_)));
    }

    #[test]
    fn success_body_mentioning_oauth_is_not_auth() {
        let body = r#"{
            "five_hour": { "utilization": 1.0 },
            "seven_day": { "utilization": 2.0 },
            "source": "oauth"
        }"#;
        assert!(interpret_response(200, body, false).is_ok());
    }
}
