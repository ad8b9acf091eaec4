use serde::{Deserialize, Serialize};

use crate::core::parser::RawUsageResponse;

/// One rolling quota window (5-hour or 7-day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Utilization as reported upstream. Not clamped; may exceed 100.
    pub percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_limit: Option<u64>,
    /// Reset timestamp exactly as the API sent it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<String>,
    /// `reset_at` as epoch milliseconds, `None` when it did not parse
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_epoch_ms: Option<i64>,
}

/// Normalized capture of both windows from a single fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub five_hour: UsageWindow,
    pub weekly: UsageWindow,
    /// Local wall-clock time of the capture
    pub updated_at_epoch_ms: i64,
    /// Untouched upstream payload, only kept when debug logging is on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawUsageResponse>,
}

impl UsageSnapshot {
    pub fn window(&self, metric: PrimaryMetric) -> &UsageWindow {
        match metric {
            PrimaryMetric::FiveHour => &self.five_hour,
            PrimaryMetric::Weekly => &self.weekly,
        }
    }
}

/// Which window drives the status indicator and threshold notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryMetric {
    #[default]
    FiveHour,
    Weekly,
}

impl PrimaryMetric {
    pub fn short_label(&self) -> &'static str {
        match self {
            Self::FiveHour => "5h",
            Self::Weekly => "7d",
        }
    }

    pub fn long_label(&self) -> &'static str {
        match self {
            Self::FiveHour => "5-hour",
            Self::Weekly => "weekly",
        }
    }
}

/// OAuth credential material.
///
/// Replaced wholesale on rotation, never patched. `Debug` only ever shows the
/// last four characters of each secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_epoch_ms: Option<i64>,
}

impl StoredToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at_epoch_ms: None,
        }
    }

    /// Last four characters of the access token, safe for diagnostics.
    pub fn suffix(&self) -> &str {
        secret_suffix(&self.access_token)
    }
}

impl std::fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredToken")
            .field("access_token", &format_args!("…{}", self.suffix()))
            .field(
                "refresh_token",
                &self
                    .refresh_token
                    .as_deref()
                    .map(|t| format!("…{}", secret_suffix(t))),
            )
            .field("expires_at_epoch_ms", &self.expires_at_epoch_ms)
            .finish()
    }
}

fn secret_suffix(secret: &str) -> &str {
    let start = secret
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &secret[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_last_four_chars() {
        let token = StoredToken::new("sk-ant-oat01-abcdWXYZ");
        assert_eq!(token.suffix(), "WXYZ");
    }

    #[test]
    fn suffix_of_short_token_is_whole_token() {
        assert_eq!(StoredToken::new("ab").suffix(), "ab");
    }

    #[test]
    fn suffix_respects_char_boundaries() {
        assert_eq!(StoredToken::new("xxééééé").suffix(), "éééé");
    }

    #[test]
    fn debug_never_prints_full_secret() {
        let token = StoredToken {
            access_token: "sk-ant-REDACTED".to_string(),
            refresh_token: Some("sk-ant-REDACTED".to_string()),
            expires_at_epoch_ms: Some(1_700_000_000_000),
        };
        let debug = format!("{:?}", token);
        assert!(!debug.contains("SECRETVALUE"));
        assert!(!debug.contains("REFRESHSECRET"));
        assert!(debug.contains("1234"));
        assert!(debug.contains("9876"));
    }

    #[test]
    fn primary_metric_deserializes_snake_case() {
        let metric: PrimaryMetric = serde_json::from_str(r#""weekly""#).unwrap();
        assert_eq!(metric, PrimaryMetric::Weekly);
        let metric: PrimaryMetric = serde_json::from_str(r#""five_hour""#).unwrap();
        assert_eq!(metric, PrimaryMetric::FiveHour);
    }
}
