//! Recognized credential blob layouts.
//!
//! Credential files and OS credential entries written by different Claude
//! tooling versions use different JSON layouts. Each layout is one extractor;
//! they are tried in a fixed order and the first structural match wins.

use serde_json::{Map, Value};

use crate::core::models::usage::StoredToken;

type Extractor = fn(&Map<String, Value>) -> Option<StoredToken>;

/// Extractors in priority order.
const SHAPES: &[(&str, Extractor)] = &[
    ("camelCase", camel_case),
    ("snake_case", snake_case),
    ("claudeAiOauth", claude_ai_oauth),
];

/// Parse a JSON document into a token, if it matches any known layout.
pub fn parse_credential_json(content: &str) -> Option<StoredToken> {
    let value: Value = serde_json::from_str(content).ok()?;
    parse_credential_object(&value)
}

/// Try every known layout in order against an already-parsed value.
pub fn parse_credential_object(value: &Value) -> Option<StoredToken> {
    let object = value.as_object()?;
    SHAPES.iter().find_map(|(name, extract)| {
        let token = extract(object)?;
        tracing::trace!(shape = name, "Credential layout matched");
        Some(token)
    })
}

fn camel_case(data: &Map<String, Value>) -> Option<StoredToken> {
    token_from(data, "accessToken", "refreshToken", "expiresAt")
}

fn snake_case(data: &Map<String, Value>) -> Option<StoredToken> {
    token_from(data, "access_token", "refresh_token", "expires_at")
}

fn claude_ai_oauth(data: &Map<String, Value>) -> Option<StoredToken> {
    let nested = data.get("claudeAiOauth")?.as_object()?;
    camel_case(nested)
}

fn token_from(
    data: &Map<String, Value>,
    access_key: &str,
    refresh_key: &str,
    expires_key: &str,
) -> Option<StoredToken> {
    let access_token = data
        .get(access_key)?
        .as_str()
        .filter(|t| !t.is_empty())?
        .to_string();
    let refresh_token = data
        .get(refresh_key)
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(String::from);
    let expires_at_epoch_ms = data.get(expires_key).and_then(|v| {
        v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
    });

    Some(StoredToken {
        access_token,
        refresh_token,
        expires_at_epoch_ms,
    })
}
