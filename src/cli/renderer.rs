use chrono::{DateTime, Local, Utc};
use colored::{control, ColoredString, Colorize};

use crate::core::config::DisplayMode;
use crate::core::formatter::{
    display_percent, format_reset, format_time_since, format_tokens, format_usage_bar, sparkline,
};
use crate::core::history::HistoryPoint;
use crate::core::models::usage::{PrimaryMetric, UsageSnapshot, UsageWindow};

const PANEL_BAR_WIDTH: usize = 20;
const STATUS_BAR_WIDTH: usize = 10;

/// One-line indicator for the primary window.
///
/// ```text
/// percentage:  Claude 73% (5h)
/// bar:         Claude [███████░░░]
/// compact:     ☁ 73%
/// ```
pub fn render_status_line(
    snapshot: &UsageSnapshot,
    metric: PrimaryMetric,
    mode: DisplayMode,
    use_color: bool,
) -> String {
    control::set_override(use_color);

    let window = snapshot.window(metric);
    let pct = display_percent(window.percent);
    let text = match mode {
        DisplayMode::Percentage => format!("Claude {}% ({})", pct, metric.short_label()),
        DisplayMode::Bar => format!(
            "Claude {}",
            format_usage_bar(window.percent, STATUS_BAR_WIDTH)
        ),
        DisplayMode::Compact => format!("☁ {}%", pct),
    };
    color_by_used(pct, &text).to_string()
}

pub fn render_loading_line(use_color: bool) -> String {
    control::set_override(use_color);
    "⟳ Claude: loading…".dimmed().to_string()
}

pub fn render_sign_in_line(use_color: bool) -> String {
    control::set_override(use_color);
    format!(
        "{} {}",
        "Claude: sign in required".yellow(),
        "(run `cwatch auth login`)".dimmed()
    )
}

pub fn render_error_line(message: &str, use_color: bool) -> String {
    control::set_override(use_color);
    format!("{} {}", "Claude: --".red(), message.dimmed())
}

/// Full detail view.
///
/// Layout:
/// ```text
///  Claude Usage
///   5-hour   73% [███████████████░░░░░]  55.0K / 75.0K tokens
///            Resets in 2h 15m
///   Weekly   41% [████████░░░░░░░░░░░░]
///            Resets Mon at 09:00
///   Trend    ▂▃▃▄▅▆ (5-hour, last 6)
///   Updated  just now
/// ```
pub fn render_panel(
    snapshot: &UsageSnapshot,
    history: &[HistoryPoint],
    now_epoch_ms: i64,
    use_color: bool,
) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = vec![" Claude Usage".bold().to_string()];
    render_window(&mut lines, "5-hour", &snapshot.five_hour, now_epoch_ms);
    render_window(&mut lines, "Weekly", &snapshot.weekly, now_epoch_ms);

    if history.len() > 1 {
        let values: Vec<f64> = history.iter().map(|p| p.five_hour_percent).collect();
        lines.push(format!(
            "  {}    {} {}",
            "Trend".cyan(),
            sparkline(&values).magenta(),
            format!("(5-hour, last {})", history.len()).dimmed()
        ));
    }

    lines.push(format!(
        "  {}  {}",
        "Updated".cyan(),
        format_time_since(snapshot.updated_at_epoch_ms, now_epoch_ms).dimmed()
    ));

    lines.join("\n")
}

pub fn render_panel_error(message: &str, is_auth: bool, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines = vec![format!(" {}", "Claude Usage (error)".bold())];
    lines.push(format!("  {}", message.red()));
    if is_auth {
        lines.push(format!(
            "  {}",
            "Run `cwatch auth login` to paste a new token.".dimmed()
        ));
    }
    lines.join("\n")
}

/// Table of stored history points, oldest first.
pub fn render_history(points: &[HistoryPoint], use_color: bool) -> String {
    control::set_override(use_color);

    if points.is_empty() {
        return "No usage history recorded yet.".dimmed().to_string();
    }

    let mut lines = vec![format!(
        "  {} {} {}",
        format!("{:<16}", "Captured").cyan(),
        format!("{:>6}", "5h").cyan(),
        format!("{:>6}", "7d").cyan()
    )];
    for point in points {
        let captured = DateTime::<Utc>::from_timestamp_millis(point.epoch_ms)
            .map(|t| t.with_timezone(&Local).format("%b %d %H:%M").to_string())
            .unwrap_or_else(|| "—".to_string());
        let five = display_percent(point.five_hour_percent);
        let weekly = display_percent(point.weekly_percent);
        lines.push(format!(
            "  {:<16} {} {}",
            captured,
            color_by_used(five, &format!("{:>5}%", five)),
            color_by_used(weekly, &format!("{:>5}%", weekly))
        ));
    }

    let values: Vec<f64> = points.iter().map(|p| p.five_hour_percent).collect();
    lines.push(format!("  {}", sparkline(&values).magenta()));
    lines.join("\n")
}

fn render_window(lines: &mut Vec<String>, label: &str, window: &UsageWindow, now_epoch_ms: i64) {
    let pct = display_percent(window.percent);
    let percent_str = format!("{:>3}%", pct);

    let tokens = match (window.tokens_used, window.tokens_limit) {
        (Some(used), Some(limit)) => format!(
            "  {}",
            format!("{} / {} tokens", format_tokens(used), format_tokens(limit)).dimmed()
        ),
        (Some(used), None) => format!("  {}", format!("{} tokens", format_tokens(used)).dimmed()),
        _ => String::new(),
    };

    lines.push(format!(
        "  {}  {} {}{}",
        format!("{:<7}", label).cyan(),
        color_by_used(pct, &percent_str),
        format_usage_bar(window.percent, PANEL_BAR_WIDTH).magenta(),
        tokens
    ));

    let reset = match window.reset_epoch_ms {
        Some(ms) => format!("Resets {}", format_reset(ms, now_epoch_ms)),
        None => "Resets —".to_string(),
    };
    // 11 spaces to align under the percent/bar values
    lines.push(format!("           {}", reset.dimmed()));
}

fn color_by_used(pct: u32, text: &str) -> ColoredString {
    if pct >= 85 {
        text.red()
    } else if pct >= 60 {
        text.yellow()
    } else {
        text.green()
    }
}
