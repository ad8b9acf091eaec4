//! Terminal implementations of the orchestrator sinks.

use colored::{control, Colorize};
use serde_json::json;

use crate::cli::output::OutputOptions;
use crate::cli::renderer;
use crate::core::config::{AppConfig, DisplayMode};
use crate::core::history::HistoryPoint;
use crate::core::models::usage::{PrimaryMetric, UsageSnapshot};
use crate::core::notifier::{CrossingEvent, Severity};
use crate::core::orchestrator::{PanelSink, StatusSink, UserNotifier};

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One-line status indicator printed to stdout on every state change.
///
/// In JSON mode each change is one JSON document per line instead.
pub struct StatusLine {
    opts: OutputOptions,
    mode: DisplayMode,
    metric: PrimaryMetric,
    last: Option<UsageSnapshot>,
    text: String,
    echo: bool,
}

impl StatusLine {
    pub fn new(opts: &OutputOptions) -> Self {
        Self {
            opts: opts.clone(),
            mode: DisplayMode::default(),
            metric: PrimaryMetric::default(),
            last: None,
            text: String::new(),
            echo: true,
        }
    }

    /// Tracks state without printing anything.
    pub fn silent(opts: &OutputOptions) -> Self {
        Self {
            echo: false,
            ..Self::new(opts)
        }
    }

    /// Most recently rendered line.
    pub fn text(&self) -> &str {
        &self.text
    }

    fn show(&mut self, text: String) {
        if self.echo && text != self.text {
            println!("{}", text);
        }
        self.text = text;
    }

    fn render(&self, snapshot: &UsageSnapshot) -> String {
        if self.opts.is_json() {
            let payload = json!({ "status": "ok", "usage": snapshot });
            return self.opts.to_json(&payload).unwrap_or_default();
        }
        renderer::render_status_line(snapshot, self.metric, self.mode, self.opts.use_color)
    }
}

impl StatusSink for StatusLine {
    fn configure(&mut self, config: &AppConfig) {
        let changed = self.mode != config.display.status_bar_display
            || self.metric != config.notifications.primary_metric;
        self.mode = config.display.status_bar_display;
        self.metric = config.notifications.primary_metric;
        if changed {
            if let Some(snapshot) = self.last.clone() {
                let text = self.render(&snapshot);
                self.show(text);
            }
        }
    }

    fn show_loading(&mut self) {
        if self.opts.is_json() {
            return;
        }
        let text = renderer::render_loading_line(self.opts.use_color);
        self.show(text);
    }

    fn show_sign_in(&mut self) {
        let text = if self.opts.is_json() {
            self.opts
                .to_json(&json!({ "status": "sign_in_required" }))
                .unwrap_or_default()
        } else {
            renderer::render_sign_in_line(self.opts.use_color)
        };
        self.show(text);
    }

    fn show_error(&mut self, message: &str) {
        let text = if self.opts.is_json() {
            self.opts
                .to_json(&json!({ "status": "error", "message": message }))
                .unwrap_or_default()
        } else {
            renderer::render_error_line(message, self.opts.use_color)
        };
        self.show(text);
    }

    fn update(&mut self, snapshot: &UsageSnapshot) {
        self.last = Some(snapshot.clone());
        let text = self.render(snapshot);
        self.show(text);
    }
}

/// Full detail block, printed below the status line when `--panel` is given.
pub struct DetailPanel {
    use_color: bool,
    enabled: bool,
}

impl DetailPanel {
    pub fn new(enabled: bool, use_color: bool) -> Self {
        Self { use_color, enabled }
    }
}

impl PanelSink for DetailPanel {
    fn update(&mut self, snapshot: &UsageSnapshot, history: &[HistoryPoint]) {
        if self.enabled {
            println!(
                "{}\n",
                renderer::render_panel(snapshot, history, now_ms(), self.use_color)
            );
        }
    }

    fn show_error(&mut self, message: &str, is_auth: bool) {
        if self.enabled {
            println!(
                "{}\n",
                renderer::render_panel_error(message, is_auth, self.use_color)
            );
        }
    }
}

/// Prints attention-worthy messages to stderr; high severity rings the bell.
pub struct ConsoleNotifier {
    use_color: bool,
}

impl ConsoleNotifier {
    pub fn new(use_color: bool) -> Self {
        Self { use_color }
    }
}

pub fn threshold_message(event: &CrossingEvent, use_color: bool) -> String {
    control::set_override(use_color);
    match event.severity {
        Severity::High => format!("\x07{} {}", "✖".red().bold(), event.message().red()),
        Severity::Standard => format!("{} {}", "⚠".yellow(), event.message().yellow()),
    }
}

pub const CREDENTIALS_NOT_FOUND: &str = "Could not auto-detect credentials from Claude Code. \
If you use the Claude CLI, your token may be in a credential store entry that could not be \
read. Run `cwatch auth login` to paste your token manually, or `-v` to see what was probed.";

pub const SIGN_IN_REQUIRED: &str = "Authentication failed and auto-recovery did not succeed. \
Run `cwatch auth login` to sign in again.";

impl UserNotifier for ConsoleNotifier {
    fn threshold_crossed(&mut self, event: &CrossingEvent) {
        eprintln!("{}", threshold_message(event, self.use_color));
    }

    fn credentials_not_found(&mut self) {
        control::set_override(self.use_color);
        eprintln!("{} {}", "ℹ".cyan(), CREDENTIALS_NOT_FOUND);
    }

    fn sign_in_required(&mut self) {
        control::set_override(self.use_color);
        eprintln!("{} {}", "⚠".yellow(), SIGN_IN_REQUIRED.yellow());
    }
}
