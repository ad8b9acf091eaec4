use std::io::IsTerminal;

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub use_color: bool,
    pub verbose: bool,
}

impl OutputOptions {
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Serialize `value` honouring `--pretty`.
    pub fn to_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        json.context("Failed to serialize output")
    }
}

pub fn detect_color(color_flag: bool) -> bool {
    if !color_flag {
        return false;
    }
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    std::io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pretty: bool) -> OutputOptions {
        OutputOptions {
            format: OutputFormat::Json,
            pretty,
            use_color: false,
            verbose: false,
        }
    }

    #[test]
    fn color_flag_off_disables_color() {
        assert!(!detect_color(false));
    }

    #[test]
    fn pretty_json_is_multiline() {
        let value = serde_json::json!({"a": 1, "b": [1, 2]});
        assert!(!opts(false).to_json(&value).unwrap().contains('\n'));
        assert!(opts(true).to_json(&value).unwrap().contains('\n'));
    }
}
