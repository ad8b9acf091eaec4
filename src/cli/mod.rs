pub mod auth_cmd;
pub mod config_cmd;
pub mod history_cmd;
pub mod output;
pub mod prompt;
pub mod renderer;
pub mod sinks;
pub mod usage_cmd;
pub mod watch_cmd;

use anyhow::{Context, Result};

use crate::cli::output::OutputOptions;
use crate::cli::sinks::{ConsoleNotifier, DetailPanel, StatusLine};
use crate::core::auth::sources::default_sources;
use crate::core::auth::store::KeyringStore;
use crate::core::auth::CredentialResolver;
use crate::core::client::UsageClient;
use crate::core::config::AppConfig;
use crate::core::history::HistoryStore;
use crate::core::orchestrator::{Orchestrator, Sinks};

/// OS keyring cache plus the platform's auto-detection cascade.
pub fn default_resolver() -> CredentialResolver {
    CredentialResolver::new(Box::new(KeyringStore::new()), default_sources())
}

/// Sinks for one-shot commands: nothing is drawn, history is still recorded.
pub fn one_shot_sinks(opts: &OutputOptions) -> Sinks {
    Sinks {
        status: Box::new(StatusLine::silent(opts)),
        panel: Box::new(DetailPanel::new(false, opts.use_color)),
        history: Box::new(HistoryStore::open(HistoryStore::default_path())),
        user: Box::new(ConsoleNotifier::new(opts.use_color)),
    }
}

pub fn build_orchestrator(
    config: AppConfig,
    resolver: CredentialResolver,
    sinks: Sinks,
) -> Result<Orchestrator> {
    let client = UsageClient::new(config.monitor.debug_logging)
        .context("Failed to build HTTP client")?;
    Ok(Orchestrator::new(config, resolver, Box::new(client), sinks))
}

/// Config for commands that fetch once: threshold notices only make sense
/// for a long-running watch.
pub fn one_shot_config() -> AppConfig {
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Using default config");
        AppConfig::default()
    });
    config.notifications.enabled = false;
    config
}
