//! Long-running monitor: timer ticks, stdin commands and ctrl-c multiplexed
//! on one task. Each refresh runs to completion before the next trigger is
//! looked at.

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::cli::output::OutputOptions;
use crate::cli::sinks::{ConsoleNotifier, DetailPanel, StatusLine};
use crate::cli::{build_orchestrator, default_resolver};
use crate::core::config::{AppConfig, ConfigError};
use crate::core::history::HistoryStore;
use crate::core::orchestrator::{Orchestrator, RefreshOutcome, Sinks};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Refresh,
    ForceRefresh,
    ToggleMode,
    Quit,
    Help,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "r" | "refresh" => Some(Command::Refresh),
        "f" | "force" => Some(Command::ForceRefresh),
        "m" | "mode" => Some(Command::ToggleMode),
        "q" | "quit" | "exit" => Some(Command::Quit),
        _ => Some(Command::Help),
    }
}

const HELP: &str = "Commands: r = refresh, f = force refresh, m = cycle display mode, q = quit";

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Forward stdin lines as commands. The channel closes with stdin.
fn spawn_stdin_reader() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(command) = parse_command(&line) {
                if tx.send(command).await.is_err() {
                    break;
                }
            }
        }
    });
    rx
}

pub async fn run(panel: bool, opts: &OutputOptions) -> Result<()> {
    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Using default config");
        AppConfig::default()
    });
    let mut period = config.refresh_interval();

    let sinks = Sinks {
        status: Box::new(StatusLine::new(opts)),
        panel: Box::new(DetailPanel::new(panel && !opts.is_json(), opts.use_color)),
        history: Box::new(HistoryStore::open(HistoryStore::default_path())),
        user: Box::new(ConsoleNotifier::new(opts.use_color)),
    };
    let mut orchestrator = build_orchestrator(config, default_resolver(), sinks)?;

    if !opts.is_json() {
        eprintln!("Refreshing every {}s. {}", period.as_secs(), HELP);
    }
    info!(interval_secs = period.as_secs(), "Watch started");

    orchestrator.refresh(true).await;

    let mut ticks = ticker(period);
    let mut commands = spawn_stdin_reader();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                let reload = reload_config(&mut orchestrator, AppConfig::load());
                if let Some(new_period) = restart_period(period, &reload) {
                    info!(interval_secs = new_period.as_secs(), "Refresh interval changed");
                    period = new_period;
                    ticks = ticker(period);
                }
                orchestrator.refresh(false).await;
            }
            command = commands.recv(), if stdin_open => match command {
                Some(Command::Refresh) => {
                    if orchestrator.refresh(false).await == RefreshOutcome::Debounced {
                        eprintln!("Refreshed moments ago; use `f` to force.");
                    }
                }
                Some(Command::ForceRefresh) => {
                    orchestrator.refresh(true).await;
                }
                Some(Command::ToggleMode) => toggle_display_mode(&mut orchestrator),
                Some(Command::Help) => eprintln!("{}", HELP),
                Some(Command::Quit) => break,
                // stdin closed (e.g. started from a service); keep polling
                None => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Watch stopped");
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Reload {
    Unchanged,
    Applied { period: Duration },
    Failed,
}

/// Pick up edits to the config file. Settings are only re-applied when the
/// freshly loaded config differs from the one in effect.
fn reload_config(
    orchestrator: &mut Orchestrator,
    loaded: Result<AppConfig, ConfigError>,
) -> Reload {
    match loaded {
        Ok(config) if &config == orchestrator.config() => Reload::Unchanged,
        Ok(config) => {
            info!("Config changed, applying");
            orchestrator.apply_config(config);
            Reload::Applied {
                period: orchestrator.config().refresh_interval(),
            }
        }
        Err(e) => {
            warn!(error = %e, "Config reload failed, keeping previous settings");
            Reload::Failed
        }
    }
}

/// New timer period, when the reload moved it.
fn restart_period(current: Duration, reload: &Reload) -> Option<Duration> {
    match reload {
        Reload::Applied { period } if *period != current => Some(*period),
        _ => None,
    }
}

fn toggle_display_mode(orchestrator: &mut Orchestrator) {
    let mut config = orchestrator.config().clone();
    config.display.status_bar_display = config.display.status_bar_display.next();
    if let Err(e) = config.save() {
        warn!(error = %e, "Could not persist display mode");
    }
    orchestrator.apply_config(config);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::store::memory::MemoryStore;
    use crate::core::auth::CredentialResolver;
    use crate::core::config::DisplayMode;

    #[test]
    fn parses_single_letter_and_word_commands() {
        assert_eq!(parse_command("r"), Some(Command::Refresh));
        assert_eq!(parse_command("refresh\n"), Some(Command::Refresh));
        assert_eq!(parse_command(" F "), Some(Command::ForceRefresh));
        assert_eq!(parse_command("m"), Some(Command::ToggleMode));
        assert_eq!(parse_command("quit"), Some(Command::Quit));
        assert_eq!(parse_command("exit"), Some(Command::Quit));
    }

    #[test]
    fn blank_line_is_ignored_and_unknown_asks_for_help() {
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("xyz"), Some(Command::Help));
    }

    fn orchestrator(config: AppConfig) -> Orchestrator {
        let opts = OutputOptions {
            format: crate::cli::output::OutputFormat::Text,
            pretty: false,
            use_color: false,
            verbose: false,
        };
        let sinks = Sinks {
            status: Box::new(StatusLine::silent(&opts)),
            panel: Box::new(DetailPanel::new(false, false)),
            history: Box::new(HistoryStore::in_memory()),
            user: Box::new(ConsoleNotifier::new(false)),
        };
        let resolver = CredentialResolver::new(Box::new(MemoryStore::default()), vec![]);
        build_orchestrator(config, resolver, sinks).unwrap()
    }

    #[test]
    fn identical_config_is_not_reapplied() {
        let mut orchestrator = orchestrator(AppConfig::default());
        let reload = reload_config(&mut orchestrator, Ok(AppConfig::default()));
        assert_eq!(reload, Reload::Unchanged);
        assert_eq!(restart_period(Duration::from_secs(60), &reload), None);
    }

    #[test]
    fn changed_interval_is_applied_and_restarts_timer() {
        let mut orchestrator = orchestrator(AppConfig::default());
        let mut edited = AppConfig::default();
        edited.monitor.refresh_interval_seconds = 30;

        let reload = reload_config(&mut orchestrator, Ok(edited.clone()));
        assert_eq!(reload, Reload::Applied { period: Duration::from_secs(30) });
        assert_eq!(orchestrator.config(), &edited);
        assert_eq!(
            restart_period(Duration::from_secs(60), &reload),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn change_without_new_interval_keeps_timer() {
        let mut orchestrator = orchestrator(AppConfig::default());
        let mut edited = AppConfig::default();
        edited.display.status_bar_display = DisplayMode::Compact;

        let reload = reload_config(&mut orchestrator, Ok(edited));
        assert_eq!(reload, Reload::Applied { period: Duration::from_secs(60) });
        assert_eq!(orchestrator.config().display.status_bar_display, DisplayMode::Compact);
        assert_eq!(restart_period(Duration::from_secs(60), &reload), None);
    }

    #[test]
    fn unreadable_config_keeps_previous_settings() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[monitor\nrefresh_interval_seconds = 15").unwrap();

        let mut orchestrator = orchestrator(AppConfig::default());
        let reload = reload_config(&mut orchestrator, AppConfig::load_from(&path));
        assert_eq!(reload, Reload::Failed);
        assert_eq!(orchestrator.config(), &AppConfig::default());
        assert_eq!(restart_period(Duration::from_secs(60), &reload), None);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_first_fires_after_one_period() {
        let mut ticks = ticker(Duration::from_secs(10));
        let start = Instant::now();
        ticks.tick().await;
        assert!(Instant::now() - start >= Duration::from_secs(10));
    }
}
