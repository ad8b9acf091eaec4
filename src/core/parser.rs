use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::models::usage::{UsageSnapshot, UsageWindow};

/// One window object as sent by the usage endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUsageWindow {
    pub utilization: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_limit: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Successful usage response body. Fields we don't model are kept in `extra`
/// so the raw payload survives untouched for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawUsageResponse {
    pub five_hour: RawUsageWindow,
    pub seven_day: RawUsageWindow,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Normalize one raw window. Never fails: a reset timestamp that doesn't
/// parse leaves `reset_epoch_ms` empty.
pub fn parse_window(raw: &RawUsageWindow) -> UsageWindow {
    let reset_epoch_ms = raw
        .resets_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(|t| t.timestamp_millis());

    UsageWindow {
        percent: raw.utilization,
        tokens_used: raw.tokens_used,
        tokens_limit: raw.tokens_limit,
        reset_at: raw.resets_at.clone(),
        reset_epoch_ms,
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| value.parse::<DateTime<Utc>>().ok())
}

/// Build a snapshot from a structurally valid response, stamped with the
/// current time.
pub fn parse_raw_response(raw: RawUsageResponse, include_raw: bool) -> UsageSnapshot {
    UsageSnapshot {
        five_hour: parse_window(&raw.five_hour),
        weekly: parse_window(&raw.seven_day),
        updated_at_epoch_ms: Utc::now().timestamp_millis(),
        raw: include_raw.then_some(raw),
    }
}
