use chrono::{DateTime, Local, Utc};

/// Clamp a raw utilization into 0..=100 and round it for display.
pub fn display_percent(percent: f64) -> u32 {
    percent.clamp(0.0, 100.0).round() as u32
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// Returns "in Xm", "in Xh Ym", or a weekday/time for resets more than a day away.
/// A reset in the past reads "now".
pub fn format_reset(reset_epoch_ms: i64, now_epoch_ms: i64) -> String {
    let diff_secs = (reset_epoch_ms - now_epoch_ms) / 1000;
    if diff_secs <= 0 {
        return "now".to_string();
    }
    if diff_secs < 3600 {
        return format!("in {}m", ((diff_secs as f64) / 60.0).round().max(1.0) as i64);
    }
    let hours = diff_secs / 3600;
    let minutes = (diff_secs % 3600) / 60;
    if diff_secs < 86_400 {
        return format!("in {}h {}m", hours, minutes);
    }
    match DateTime::<Utc>::from_timestamp_millis(reset_epoch_ms) {
        Some(at) => at.with_timezone(&Local).format("%a at %H:%M").to_string(),
        None => "—".to_string(),
    }
}

/// Returns "just now", "42s ago", "5m ago" or "2h ago".
pub fn format_time_since(epoch_ms: i64, now_epoch_ms: i64) -> String {
    let secs = ((now_epoch_ms - epoch_ms) as f64 / 1000.0).round() as i64;
    if secs < 5 {
        "just now".to_string()
    } else if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", (secs as f64 / 60.0).round() as i64)
    } else {
        format!("{}h ago", (secs as f64 / 3600.0).round() as i64)
    }
}

/// Returns "[████░░░░░░]" where █ = used portion, ░ = remaining.
pub fn format_usage_bar(percent: f64, width: usize) -> String {
    let used_blocks = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    let free_blocks = width.saturating_sub(used_blocks);
    format!("[{}{}]", "█".repeat(used_blocks), "░".repeat(free_blocks))
}

/// Compact token counts: 950, 55.0K, 1.2M.
pub fn format_tokens(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        format!("{}", count)
    }
}

/// One block character per value, scaled to 0..=100.
pub fn sparkline(values: &[f64]) -> String {
    const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    values
        .iter()
        .map(|v| {
            let idx = ((v.clamp(0.0, 100.0) / 100.0) * (LEVELS.len() - 1) as f64).round();
            LEVELS[idx as usize]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_771_430_400_000;

    #[test]
    fn display_percent_clamps_and_rounds() {
        assert_eq!(display_percent(72.5), 73);
        assert_eq!(display_percent(-3.0), 0);
        assert_eq!(display_percent(130.0), 100);
    }

    #[test]
    fn truncate_short_text_is_untouched() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn truncate_long_text_adds_ellipsis() {
        assert_eq!(truncate("hello world", 5), "hello…");
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("ééééé", 2), "éé…");
    }

    #[test]
    fn format_reset_past_is_now() {
        assert_eq!(format_reset(NOW - 10_000, NOW), "now");
    }

    #[test]
    fn format_reset_minutes() {
        assert_eq!(format_reset(NOW + 45 * 60_000, NOW), "in 45m");
        assert_eq!(format_reset(NOW + 10_000, NOW), "in 1m");
    }

    #[test]
    fn format_reset_hours_and_minutes() {
        assert_eq!(format_reset(NOW + 135 * 60_000, NOW), "in 2h 15m");
    }

    #[test]
    fn format_reset_days_uses_weekday() {
        let result = format_reset(NOW + 3 * 86_400_000, NOW);
        assert!(result.contains(" at "), "got {}", result);
    }

    #[test]
    fn time_since_buckets() {
        assert_eq!(format_time_since(NOW - 1_000, NOW), "just now");
        assert_eq!(format_time_since(NOW - 42_000, NOW), "42s ago");
        assert_eq!(format_time_since(NOW - 5 * 60_000, NOW), "5m ago");
        assert_eq!(format_time_since(NOW - 2 * 3_600_000, NOW), "2h ago");
    }

    #[test]
    fn format_usage_bar_width() {
        assert_eq!(format_usage_bar(0.0, 10), "[░░░░░░░░░░]");
        assert_eq!(format_usage_bar(100.0, 10), "[██████████]");
        assert_eq!(format_usage_bar(50.0, 10), "[█████░░░░░]");
        assert_eq!(format_usage_bar(150.0, 10), "[██████████]");
    }

    #[test]
    fn format_tokens_scales() {
        assert_eq!(format_tokens(950), "950");
        assert_eq!(format_tokens(55_000), "55.0K");
        assert_eq!(format_tokens(1_200_000), "1.2M");
    }

    #[test]
    fn sparkline_maps_extremes() {
        assert_eq!(sparkline(&[0.0, 100.0]), "▁█");
        assert_eq!(sparkline(&[]), "");
    }
}
